//! Remote import discovery.
//!
//! An import path such as `example.org/pkg/sub` is resolved by fetching
//! `https://example.org/pkg/sub?go-get=1` and reading the
//! `<meta name="go-import" content="prefix vcs repo">` tag of the response.
//! The repository is then cloned to `prefix`.

use super::{GitResolver, Resolution, ResolveError, Resolver};
use crate::paths;
use async_trait::async_trait;
use bottle_schema::ImportPath;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Problems with the `go-import` meta tag of a discovery page.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The page has no such tag.
    #[error("no \"go-import\" meta tag found")]
    Missing,

    /// The page has more than one such tag.
    #[error("found {0} \"go-import\" meta tags, expected one")]
    Ambiguous(usize),

    /// The content is not `prefix vcs repo`.
    #[error("\"go-import\" meta tag does not contain correctly formatted content")]
    Malformed,

    /// A tag pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Content of a `go-import` meta tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportMeta {
    /// Import path of the repository root.
    pub prefix: ImportPath,
    /// Version control system, e.g. `git`.
    pub vcs: String,
    /// Repository URL.
    pub repo: String,
}

/// Extract the single `go-import` meta tag from an HTML document.
pub fn parse_import_meta(html: &str) -> Result<ImportMeta, MetaError> {
    let tag_re = Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*("go-import"|'go-import'|go-import)[^>]*>"#)?;
    let content_re = Regex::new(r#"(?i)content\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?;

    let tags: Vec<&str> = tag_re.find_iter(html).map(|m| m.as_str()).collect();
    let tag = match tags.as_slice() {
        [] => return Err(MetaError::Missing),
        [tag] => *tag,
        more => return Err(MetaError::Ambiguous(more.len())),
    };

    let content = content_re
        .captures(tag)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .ok_or(MetaError::Malformed)?
        .as_str();

    match content.split_whitespace().collect::<Vec<_>>().as_slice() {
        [prefix, vcs, repo] => Ok(ImportMeta {
            prefix: ImportPath::new(prefix),
            vcs: (*vcs).to_string(),
            repo: (*repo).to_string(),
        }),
        _ => Err(MetaError::Malformed),
    }
}

/// Resolves import paths through remote discovery, then clones with git.
pub struct RemoteResolver {
    client: reqwest::Client,
    git: Arc<GitResolver>,
    origin: Option<String>,
}

impl std::fmt::Debug for RemoteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteResolver")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl RemoteResolver {
    /// A resolver discovering over `client` and cloning through `git`.
    pub fn new(client: reqwest::Client, git: Arc<GitResolver>) -> Self {
        Self {
            client,
            git,
            origin: None,
        }
    }

    /// Send discovery requests to `origin` (scheme and host, e.g. a local
    /// mirror) instead of `https://<import>`.
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    fn discovery_url(&self, import: &ImportPath) -> String {
        match &self.origin {
            Some(origin) => format!("{}/{import}?go-get=1", origin.trim_end_matches('/')),
            None => format!("https://{import}?go-get=1"),
        }
    }

    /// Fetch and parse the `go-import` meta of `import`.
    pub async fn discover(&self, import: &ImportPath) -> Result<ImportMeta, ResolveError> {
        let url = self.discovery_url(import);
        tracing::debug!(%url, "remote import discovery");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|source| ResolveError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status { url, status });
        }
        let body = response
            .text()
            .await
            .map_err(|source| ResolveError::Http {
                url: url.clone(),
                source,
            })?;

        parse_import_meta(&body).map_err(|source| ResolveError::Meta { url, source })
    }
}

#[async_trait]
impl Resolver for RemoteResolver {
    #[tracing::instrument(level = "debug", skip(self, workspace))]
    async fn resolve(
        &self,
        locator: &str,
        import: &ImportPath,
        workspace: &Path,
    ) -> Result<Resolution, ResolveError> {
        if paths::package_dir(workspace, import).exists() {
            return Ok(Resolution::AlreadyResolved);
        }

        // the locator of a remote dependency is the import path to discover
        let target = ImportPath::new(locator);
        let meta = self.discover(&target).await?;
        if meta.prefix != target {
            if target.strip_prefix(&meta.prefix).is_none() {
                return Err(ResolveError::OutsidePrefix {
                    import: target,
                    prefix: meta.prefix,
                });
            }
            let root = self.discover(&meta.prefix).await?;
            if root != meta {
                return Err(ResolveError::PrefixMismatch {
                    import: target,
                    prefix: meta.prefix,
                });
            }
        }

        if meta.vcs != "git" {
            return Err(ResolveError::UnsupportedVcs {
                import: target,
                vcs: meta.vcs,
            });
        }
        // TODO: report Fetched for a subpackage whose prefix was cloned earlier in
        // the same run, so the tracker ingests it
        self.git.resolve(&meta.repo, &meta.prefix, workspace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandRunner, ExecError, Invocation};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGit(Mutex<Vec<Invocation>>);

    #[async_trait]
    impl CommandRunner for FakeGit {
        async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
            let dest = std::path::PathBuf::from(&invocation.args[3]);
            std::fs::create_dir_all(dest.join(".git")).unwrap();
            self.0.lock().unwrap().push(invocation.clone());
            Ok(String::new())
        }
    }

    fn meta_page(content: &str) -> String {
        format!(
            "<html><head><meta name=\"go-import\" content=\"{content}\"></head><body>go get</body></html>"
        )
    }

    #[test]
    fn test_parse_meta_variants() {
        let meta = parse_import_meta(&meta_page("example.org/pkg git https://git.example.org/pkg")).unwrap();
        assert_eq!(meta.prefix, "example.org/pkg");
        assert_eq!(meta.vcs, "git");
        assert_eq!(meta.repo, "https://git.example.org/pkg");

        let single_quoted = "<META content='a.org/x hg https://a.org/x' name=go-import>";
        assert_eq!(parse_import_meta(single_quoted).unwrap().vcs, "hg");
    }

    #[test]
    fn test_parse_meta_errors() {
        assert!(matches!(
            parse_import_meta("<meta name=\"description\" content=\"x\">"),
            Err(MetaError::Missing)
        ));
        assert!(matches!(
            parse_import_meta(&meta_page("example.org/pkg git")),
            Err(MetaError::Malformed)
        ));
        let two = format!("{}{}", meta_page("a git b"), meta_page("c git d"));
        assert!(matches!(parse_import_meta(&two), Err(MetaError::Ambiguous(2))));
    }

    fn resolver(server: &mockito::ServerGuard) -> (RemoteResolver, Arc<FakeGit>) {
        let runner = Arc::new(FakeGit::default());
        let git = Arc::new(GitResolver::new(runner.clone()));
        let remote = RemoteResolver::new(reqwest::Client::new(), git).with_origin(Some(server.url()));
        (remote, runner)
    }

    #[tokio::test]
    async fn test_subpackage_resolves_through_prefix() {
        let mut server = mockito::Server::new_async().await;
        let page = meta_page("example.org/pkg git https://git.example.org/pkg");
        let sub = server
            .mock("GET", "/example.org/pkg/sub")
            .match_query(mockito::Matcher::UrlEncoded("go-get".into(), "1".into()))
            .with_body(&page)
            .create_async()
            .await;
        let root = server
            .mock("GET", "/example.org/pkg")
            .match_query(mockito::Matcher::UrlEncoded("go-get".into(), "1".into()))
            .with_body(&page)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (remote, runner) = resolver(&server);
        let res = remote
            .resolve("example.org/pkg/sub", &"example.org/pkg/sub".into(), tmp.path())
            .await
            .unwrap();

        assert_eq!(res, Resolution::Fetched);
        sub.assert_async().await;
        root.assert_async().await;
        let calls = runner.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arg_is(2, "https://git.example.org/pkg"));
        assert!(tmp.path().join("src/example.org/pkg/.git").is_dir());
    }

    #[tokio::test]
    async fn test_second_subpackage_of_a_cloned_prefix_is_already_resolved() {
        let mut server = mockito::Server::new_async().await;
        let page = meta_page("example.org/pkg git https://git.example.org/pkg");
        for path in ["/example.org/pkg", "/example.org/pkg/a", "/example.org/pkg/b"] {
            server
                .mock("GET", path)
                .match_query(mockito::Matcher::Any)
                .with_body(&page)
                .create_async()
                .await;
        }

        let tmp = tempfile::tempdir().unwrap();
        let (remote, runner) = resolver(&server);
        let first = remote
            .resolve("example.org/pkg/a", &"example.org/pkg/a".into(), tmp.path())
            .await
            .unwrap();
        let second = remote
            .resolve("example.org/pkg/b", &"example.org/pkg/b".into(), tmp.path())
            .await
            .unwrap();

        assert_eq!(first, Resolution::Fetched);
        assert_eq!(second, Resolution::AlreadyResolved);
        assert_eq!(runner.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_prefix_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/example.org/pkg/sub")
            .match_query(mockito::Matcher::Any)
            .with_body(meta_page("example.org/pkg git https://git.example.org/pkg"))
            .create_async()
            .await;
        server
            .mock("GET", "/example.org/pkg")
            .match_query(mockito::Matcher::Any)
            .with_body(meta_page("example.org/pkg git https://elsewhere.org/pkg"))
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (remote, runner) = resolver(&server);
        let err = remote
            .resolve("example.org/pkg/sub", &"example.org/pkg/sub".into(), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::PrefixMismatch { .. }));
        assert!(runner.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_and_unknown_vcs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/example.org/gone")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/example.org/hg")
            .match_query(mockito::Matcher::Any)
            .with_body(meta_page("example.org/hg hg https://example.org/hg"))
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (remote, _) = resolver(&server);
        let err = remote
            .resolve("example.org/gone", &"example.org/gone".into(), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Status { .. }));

        let err = remote
            .resolve("example.org/hg", &"example.org/hg".into(), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedVcs { .. }));
    }

    #[tokio::test]
    async fn test_existing_package_skips_discovery() {
        let server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/example.org/pkg")).unwrap();

        let (remote, _) = resolver(&server);
        let res = remote
            .resolve("example.org/pkg", &"example.org/pkg".into(), tmp.path())
            .await
            .unwrap();
        assert_eq!(res, Resolution::AlreadyResolved);
    }
}

//! The dependency graph engine.
//!
//! A [`DependencyTracker`] starts from the root package, normalizes every
//! declared dependency into a [`Dependency`], and drives the resolvers until
//! nothing is left unresolved. Fetches run concurrently, one task per
//! dependency, but their results are ingested in dispatch order so the graph
//! (and any conflict it reports) is the same on every run.

use crate::discovery::{Discovery, DiscoveryError};
use crate::exec::{CommandRunner, ExecError};
use crate::materialize::{ImportRewriter, MaterializeError};
use crate::paths;
use crate::resolvers::{Resolution, ResolveError, ResolverRegistry};
use crate::settings::{Settings, Toolchain};
use bottle_schema::{Config, Dependency, DependencySpec, ImportPath, Transport};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// Hosts whose import paths map directly onto `https://<host>/<owner>/<repo>.git`.
const GIT_HOSTS: [&str; 2] = ["github.com/", "bitbucket.org/"];

/// Errors that stop dependency resolution.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Two different dependencies claim the same import path.
    #[error("import path \"{import}\" is claimed by both {existing} and {dependency}")]
    Conflict {
        /// The contested import path.
        import: ImportPath,
        /// The dependency that claimed it first.
        existing: Dependency,
        /// The dependency claiming it now.
        dependency: Dependency,
    },

    /// A declared name would place a package outside `<workspace>/src`.
    #[error("invalid import path {import:?} declared by \"{owner}\": it must be a relative path without empty, '.' or '..' segments")]
    InvalidImport {
        /// The name as declared.
        import: String,
        /// Package whose manifest declares it.
        owner: ImportPath,
    },

    /// No resolver is registered for the dependency's transport.
    #[error("no resolver exists for transport \"{0}\"")]
    NoResolver(Transport),

    /// A resolver failed.
    #[error("failed to resolve {dependency}: {source}")]
    Resolve {
        /// The dependency being fetched.
        dependency: Dependency,
        /// The resolver's error.
        #[source]
        source: ResolveError,
    },

    /// A fetched package could not be loaded.
    #[error("failed to find package \"{import}\": {source}")]
    Discovery {
        /// Import path the package was fetched to.
        import: ImportPath,
        /// The discovery error.
        #[source]
        source: DiscoveryError,
    },

    /// Rewriting the imports of a fetched package failed.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// The `go get` fallback for an unmanaged package failed.
    #[error("failed fetching \"{import}\" dependencies with \"go get\": {source}")]
    Fallback {
        /// The unmanaged package.
        import: ImportPath,
        /// The failed toolchain run.
        #[source]
        source: ExecError,
    },

    /// Building an install target failed.
    #[error("failed to build dependency \"{package}\": {source}")]
    Install {
        /// The install target.
        package: ImportPath,
        /// The failed toolchain run.
        #[source]
        source: ExecError,
    },

    /// A resolver task dropped its completion channel.
    #[error("a resolver task ended without reporting its result")]
    WorkerLost,

    /// The binary directory could not be created.
    #[error("failed to create {}: {source}", .path.display())]
    Io {
        /// Directory being created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Normalize one declaration of `project`'s manifest.
///
/// Returns the dependency and the import path it claims:
///
/// | Declaration | Dependency | Import path |
/// |---|---|---|
/// | `{ path = "../x" }` | `path+/abs/x` | declared name |
/// | `{ git = "<url>" }` | `git+<url>` | declared name |
/// | `"github.com/a/b/c" = {}` | `git+https://github.com/a/b.git` | `github.com/a/b` |
/// | `"bitbucket.org/a/b" = {}` | `git+https://bitbucket.org/a/b.git` | `bitbucket.org/a/b` |
/// | anything else | `remote+<name>` | declared name |
pub fn normalize(project: &Path, name: &ImportPath, spec: &DependencySpec) -> (Dependency, ImportPath) {
    if let Some(path) = spec.path.as_deref().filter(|p| !p.is_empty()) {
        let dir = paths::absolute(&project.join(path));
        return (
            Dependency::new(Transport::Path, dir.to_string_lossy()),
            name.clone(),
        );
    }
    if let Some(url) = spec.git.as_deref().filter(|u| !u.is_empty()) {
        return (Dependency::new(Transport::Git, url), name.clone());
    }
    if GIT_HOSTS.iter().any(|host| name.starts_with(host)) {
        let prefix = name.hosting_prefix();
        return (
            Dependency::new(Transport::Git, format!("https://{prefix}.git")),
            prefix,
        );
    }
    (Dependency::new(Transport::Remote, name.as_str()), name.clone())
}

type Completion = oneshot::Receiver<Result<Resolution, ResolveError>>;

/// Resolution state for one build.
pub struct DependencyTracker {
    root: Config,
    root_import: ImportPath,
    registry: Arc<ResolverRegistry>,
    runner: Arc<dyn CommandRunner>,
    toolchain: Toolchain,
    discovery: Discovery,

    /// Import path -> the dependency that claimed it.
    used_imports: HashMap<ImportPath, Dependency>,
    /// Imports fetched during this run (excludes already-present ones).
    updated_imports: HashSet<ImportPath>,
    canonical_paths: HashMap<Dependency, ImportPath>,

    install_packages: BTreeSet<ImportPath>,
    /// Install target -> import prefix owning it (`github.com/a/b/cmd/x` -> `github.com/a/b`).
    package_prefixes: HashMap<ImportPath, ImportPath>,

    resolved: HashSet<Dependency>,
    unresolved: Vec<Dependency>,
    dispatched: Vec<Dependency>,

    /// Per owning package: local name -> canonical import path.
    renames: HashMap<ImportPath, BTreeMap<String, String>>,
    needs_fallback: Vec<ImportPath>,
}

impl std::fmt::Debug for DependencyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyTracker")
            .field("root", &self.root_import)
            .field("unresolved", &self.unresolved.len())
            .field("dispatched", &self.dispatched.len())
            .field("install_packages", &self.install_packages)
            .finish_non_exhaustive()
    }
}

impl DependencyTracker {
    /// Seed a tracker with the root package and its declared dependencies.
    pub fn new(
        root: Config,
        registry: Arc<ResolverRegistry>,
        runner: Arc<dyn CommandRunner>,
        settings: &Settings,
    ) -> Result<Self, TrackerError> {
        let root_import = root.import_path.clone().unwrap_or_else(|| root.name());
        if !root_import.is_contained() {
            return Err(TrackerError::InvalidImport {
                import: root_import.to_string(),
                owner: root_import,
            });
        }
        let discovery = Discovery::new(settings).with_workspace_root(&root.workspace);

        let mut tracker = Self {
            root_import: root_import.clone(),
            registry,
            runner,
            toolchain: settings.toolchain.clone(),
            discovery,
            used_imports: HashMap::new(),
            updated_imports: HashSet::new(),
            canonical_paths: HashMap::new(),
            install_packages: BTreeSet::new(),
            package_prefixes: HashMap::new(),
            resolved: HashSet::new(),
            unresolved: Vec::new(),
            dispatched: Vec::new(),
            renames: HashMap::new(),
            needs_fallback: Vec::new(),
            root,
        };

        let seed = Dependency::new(Transport::Path, tracker.root.package_root.to_string_lossy());
        tracker.canonical_paths.insert(seed.clone(), root_import.clone());
        tracker.used_imports.insert(root_import.clone(), seed);

        let root = tracker.root.clone();
        tracker.add_package(&root, &root_import)?;
        Ok(tracker)
    }

    /// Record the dependencies of the package `cfg`, known in the workspace
    /// as `owner`.
    pub fn add_package(&mut self, cfg: &Config, owner: &ImportPath) -> Result<(), TrackerError> {
        if cfg.missing && !cfg.package_root.join("vendor").exists() {
            let import = cfg.import_path.clone().unwrap_or_else(|| owner.clone());
            tracing::debug!(%import, "unmanaged package, deferring to fallback fetch");
            self.needs_fallback.push(import);
        }

        for (name, spec) in &cfg.dependencies {
            let declared = ImportPath::new(name);
            if !declared.is_contained() {
                return Err(TrackerError::InvalidImport {
                    import: name.clone(),
                    owner: owner.clone(),
                });
            }
            let (dependency, import) = normalize(&cfg.project, &declared, spec);
            let sub_path = declared.strip_prefix(&import).unwrap_or_default().to_string();

            if let Some(canonical) = self.canonical_paths.get(&dependency).cloned() {
                let effective = canonical.join(&sub_path);
                tracing::trace!(%declared, %effective, "dependency already tracked");
                if spec.install {
                    self.add_install(effective.clone(), canonical);
                }
                if effective != declared {
                    self.renames
                        .entry(owner.clone())
                        .or_default()
                        .insert(declared.to_string(), effective.to_string());
                }
                continue;
            }

            if let Some(existing) = self.used_imports.get(&import) {
                return Err(TrackerError::Conflict {
                    import,
                    existing: existing.clone(),
                    dependency,
                });
            }

            tracing::debug!(%dependency, %import, "new dependency");
            self.unresolved.push(dependency.clone());
            self.canonical_paths.insert(dependency.clone(), import.clone());
            self.used_imports.insert(import.clone(), dependency);
            if spec.install {
                self.add_install(declared, import);
            }
        }
        Ok(())
    }

    fn add_install(&mut self, package: ImportPath, owner: ImportPath) {
        self.package_prefixes.insert(package.clone(), owner);
        self.install_packages.insert(package);
    }

    /// Resolve every dependency, transitively, then run the fallback fetch
    /// for unmanaged packages.
    ///
    /// The first error aborts the run; fetches still in flight are left to
    /// finish on their own.
    #[tracing::instrument(skip_all, fields(package = %self.root_import))]
    pub async fn resolve_all(&mut self) -> Result<(), TrackerError> {
        let mut pending: VecDeque<(Dependency, Completion)> = VecDeque::new();

        while !self.unresolved.is_empty() || !pending.is_empty() {
            for dependency in std::mem::take(&mut self.unresolved) {
                if self.resolved.insert(dependency.clone()) {
                    let completion = self.dispatch(&dependency)?;
                    pending.push_back((dependency, completion));
                }
            }

            // always wait for the oldest fetch
            let Some((dependency, completion)) = pending.pop_front() else {
                continue;
            };
            let result = completion.await.map_err(|_| TrackerError::WorkerLost)?;
            self.complete(dependency, result)?;

            // then take whatever else is ready, in order, without skipping
            while let Some((dependency, mut completion)) = pending.pop_front() {
                match completion.try_recv() {
                    Ok(result) => self.complete(dependency, result)?,
                    Err(oneshot::error::TryRecvError::Empty) => {
                        pending.push_front((dependency, completion));
                        break;
                    }
                    Err(oneshot::error::TryRecvError::Closed) => {
                        return Err(TrackerError::WorkerLost);
                    }
                }
            }
        }

        self.fetch_fallbacks().await
    }

    fn dispatch(&mut self, dependency: &Dependency) -> Result<Completion, TrackerError> {
        let resolver = self
            .registry
            .get(dependency.transport)
            .ok_or(TrackerError::NoResolver(dependency.transport))?;
        let import = self.import_of(dependency);
        let workspace = self.root.workspace.clone();
        let locator = dependency.locator.clone();

        tracing::debug!(%dependency, %import, "dispatching");
        self.dispatched.push(dependency.clone());

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = resolver.resolve(&locator, &import, &workspace).await;
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    fn import_of(&self, dependency: &Dependency) -> ImportPath {
        self.canonical_paths
            .get(dependency)
            .cloned()
            .unwrap_or_else(|| ImportPath::new(&dependency.locator))
    }

    fn complete(
        &mut self,
        dependency: Dependency,
        result: Result<Resolution, ResolveError>,
    ) -> Result<(), TrackerError> {
        match result {
            Ok(Resolution::Fetched) => self.ingest(&dependency),
            Ok(Resolution::AlreadyResolved) => {
                tracing::debug!(%dependency, "already resolved");
                Ok(())
            }
            Err(source) => Err(TrackerError::Resolve { dependency, source }),
        }
    }

    /// Load a freshly fetched package and track its dependencies.
    fn ingest(&mut self, dependency: &Dependency) -> Result<(), TrackerError> {
        let import = self.import_of(dependency);
        self.updated_imports.insert(import.clone());

        let dest = paths::package_dir(&self.root.workspace, &import);
        let mut cfg = self
            .discovery
            .load(&dest)
            .map_err(|source| TrackerError::Discovery {
                import: import.clone(),
                source,
            })?;
        // relative paths in a local package point at its neighbours, not the workspace
        if dependency.transport == Transport::Path {
            cfg = cfg.with_project(PathBuf::from(&dependency.locator));
        }

        self.add_package(&cfg, &import)?;

        if let Some(table) = self.renames.get(&import) {
            let changed = ImportRewriter::new(table)?.rewrite_tree(&dest)?;
            tracing::debug!(%import, changed, "rewrote imports");
        }
        Ok(())
    }

    /// Fetch the dependencies of unmanaged packages with `go get -d`.
    pub async fn fetch_fallbacks(&self) -> Result<(), TrackerError> {
        for import in &self.needs_fallback {
            let target = format!("{import}/...");
            tracing::info!("fetching {target} with the toolchain");
            let invocation = self
                .toolchain
                .command(&self.root.workspace, ["get", "-d", target.as_str()]);
            self.runner
                .run(&invocation)
                .await
                .map_err(|source| TrackerError::Fallback {
                    import: import.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Build every install target whose package was fetched during this run
    /// into `<workspace>/bin`. Returns the binaries built.
    #[tracing::instrument(skip_all, fields(package = %self.root_import))]
    pub async fn install_all(&self) -> Result<Vec<PathBuf>, TrackerError> {
        let bin = paths::bin_dir(&self.root.workspace);
        tokio::fs::create_dir_all(&bin)
            .await
            .map_err(|source| TrackerError::Io {
                path: bin.clone(),
                source,
            })?;

        let mut built = Vec::new();
        for package in &self.install_packages {
            let owner = self.package_prefixes.get(package).unwrap_or(package);
            if !self.updated_imports.contains(owner) {
                tracing::debug!(%package, "unchanged, not rebuilding");
                continue;
            }

            let exe = bin.join(package.base_name());
            let invocation = self
                .toolchain
                .command(&self.root.workspace, ["build", "-o"])
                .arg(&exe)
                .arg(package.as_str());
            self.runner
                .run(&invocation)
                .await
                .map_err(|source| TrackerError::Install {
                    package: package.clone(),
                    source,
                })?;
            tracing::info!(%package, "installed {}", exe.display());
            built.push(exe);
        }
        Ok(built)
    }

    /// Configuration of the root package.
    pub fn root(&self) -> &Config {
        &self.root
    }

    /// Import path of the root package inside the workspace.
    pub fn root_import(&self) -> &ImportPath {
        &self.root_import
    }

    /// Packages to build after resolution.
    pub fn install_set(&self) -> &BTreeSet<ImportPath> {
        &self.install_packages
    }

    /// Import path a dependency was fetched to.
    pub fn canonical_path(&self, dependency: &Dependency) -> Option<&ImportPath> {
        self.canonical_paths.get(dependency)
    }

    /// Dependencies handed to a resolver, in dispatch order.
    pub fn dispatched(&self) -> &[Dependency] {
        &self.dispatched
    }

    /// Import paths fetched during this run.
    pub fn updated_imports(&self) -> &HashSet<ImportPath> {
        &self.updated_imports
    }

    /// Local name -> canonical import substitutions for `package`.
    pub fn renames_for(&self, package: &ImportPath) -> Option<&BTreeMap<String, String>> {
        self.renames.get(package)
    }

    /// Unmanaged packages handed to the fallback fetch.
    pub fn needs_fallback(&self) -> &[ImportPath] {
        &self.needs_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Invocation;
    use crate::resolvers::Resolver;
    use async_trait::async_trait;
    use bottle_schema::PackageSection;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Resolver that materializes canned manifests after a per-import delay.
    #[derive(Default)]
    struct Scripted {
        delays: HashMap<String, u64>,
        manifests: HashMap<String, String>,
        already_present: bool,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn delay(mut self, import: &str, millis: u64) -> Self {
            self.delays.insert(import.to_string(), millis);
            self
        }

        fn manifest(mut self, import: &str, toml: &str) -> Self {
            self.manifests.insert(import.to_string(), toml.to_string());
            self
        }
    }

    #[async_trait]
    impl Resolver for Scripted {
        async fn resolve(
            &self,
            _locator: &str,
            import: &ImportPath,
            workspace: &Path,
        ) -> Result<Resolution, ResolveError> {
            if let Some(ms) = self.delays.get(import.as_str()) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            let dest = paths::package_dir(workspace, import);
            std::fs::create_dir_all(&dest).unwrap();
            if let Some(toml) = self.manifests.get(import.as_str()) {
                std::fs::write(dest.join("Bottle.toml"), toml).unwrap();
            }
            self.calls.lock().unwrap().push(import.to_string());
            Ok(if self.already_present {
                Resolution::AlreadyResolved
            } else {
                Resolution::Fetched
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Invocation>>);

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
            self.0.lock().unwrap().push(invocation.clone());
            Ok(String::new())
        }
    }

    fn spec() -> DependencySpec {
        DependencySpec::default()
    }

    fn path_spec(path: &str) -> DependencySpec {
        DependencySpec {
            path: Some(path.to_string()),
            ..DependencySpec::default()
        }
    }

    fn root_config(tmp: &Path, deps: Vec<(&str, DependencySpec)>) -> Config {
        Config {
            project: tmp.join("app"),
            workspace: tmp.join("ws"),
            package_root: tmp.join("app"),
            package: PackageSection {
                name: "example.com/app".to_string(),
                ..PackageSection::default()
            },
            dependencies: deps
                .into_iter()
                .map(|(name, spec)| (name.to_string(), spec))
                .collect(),
            bin: Vec::new(),
            missing: false,
            import_path: None,
        }
    }

    fn tracker(
        root: Config,
        resolvers: Vec<(Transport, Arc<dyn Resolver>)>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<DependencyTracker, TrackerError> {
        let mut registry = ResolverRegistry::new();
        for (transport, resolver) in resolvers {
            registry.register(transport, resolver);
        }
        let settings = Settings {
            workspace_base: root.workspace.join("base"),
            ..Settings::default()
        };
        DependencyTracker::new(root, Arc::new(registry), runner, &settings)
    }

    #[test]
    fn test_normalize_rules() {
        let project = Path::new("/home/me/app");
        let (dep, import) = normalize(project, &"mylib".into(), &path_spec("../mylib"));
        assert_eq!(dep, Dependency::new(Transport::Path, "/home/me/mylib"));
        assert_eq!(import, "mylib");

        let git = DependencySpec {
            git: Some("https://example.com/tool.git".into()),
            ..spec()
        };
        let (dep, _) = normalize(project, &"tool".into(), &git);
        assert_eq!(dep, Dependency::new(Transport::Git, "https://example.com/tool.git"));

        let (dep, import) = normalize(project, &"github.com/a/b/cmd/x".into(), &spec());
        assert_eq!(dep, Dependency::new(Transport::Git, "https://github.com/a/b.git"));
        assert_eq!(import, "github.com/a/b");

        let (dep, import) = normalize(project, &"bitbucket.org/a/b".into(), &spec());
        assert_eq!(dep.locator, "https://bitbucket.org/a/b.git");
        assert_eq!(import, "bitbucket.org/a/b");

        let (dep, import) = normalize(project, &"golang.org/x/net/html".into(), &spec());
        assert_eq!(dep, Dependency::new(Transport::Remote, "golang.org/x/net/html"));
        assert_eq!(import, "golang.org/x/net/html");
    }

    #[tokio::test]
    async fn test_duplicate_declarations_dispatch_once() {
        let tmp = tempfile::tempdir().unwrap();
        let root = root_config(
            tmp.path(),
            vec![("alias", path_spec("../lib")), ("mylib", path_spec("../lib"))],
        );
        let resolver = Arc::new(Scripted::default());
        let mut tracker = tracker(
            root,
            vec![(Transport::Path, resolver.clone() as Arc<dyn Resolver>)],
            Arc::new(Recorder::default()),
        )
        .unwrap();
        tracker.resolve_all().await.unwrap();

        assert_eq!(tracker.dispatched().len(), 1);
        assert_eq!(*resolver.calls.lock().unwrap(), vec!["alias".to_string()]);
        let lib = Dependency::new(Transport::Path, tmp.path().join("lib").to_string_lossy());
        assert_eq!(tracker.canonical_path(&lib).unwrap(), "alias");

        let renames = tracker.renames_for(&"example.com/app".into()).unwrap();
        assert_eq!(renames.get("mylib").map(String::as_str), Some("alias"));
    }

    #[tokio::test]
    async fn test_conflicting_import_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let root = root_config(tmp.path(), vec![("shared", path_spec("../one"))]);
        let resolver = Arc::new(Scripted::default().manifest(
            "shared",
            "[package]\nname = \"shared\"\n[dependencies]\n\"aaa\" = {}\n\"shared\" = { path = \"../two\" }\n",
        ));
        let mut tracker = tracker(
            root,
            vec![
                (Transport::Path, resolver.clone() as Arc<dyn Resolver>),
                (Transport::Remote, resolver.clone() as Arc<dyn Resolver>),
            ],
            Arc::new(Recorder::default()),
        )
        .unwrap();

        let err = tracker.resolve_all().await.unwrap_err();
        match err {
            TrackerError::Conflict { import, .. } => assert_eq!(import, "shared"),
            other => panic!("expected a conflict, got {other}"),
        }
        assert_eq!(tracker.dispatched().len(), 1);
        assert_eq!(resolver.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingestion_follows_dispatch_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = root_config(
            tmp.path(),
            vec![("example.com/a", spec()), ("example.com/b", spec())],
        );
        let resolver = Scripted::default()
            .delay("example.com/a", 150)
            .delay("example.com/b", 5)
            .manifest(
                "example.com/a",
                "[package]\nname = \"example.com/a\"\n[dependencies]\n\"example.com/c\" = {}\n",
            )
            .manifest(
                "example.com/b",
                "[package]\nname = \"example.com/b\"\n[dependencies]\n\"example.com/d\" = {}\n",
            );
        let resolver = Arc::new(resolver);
        let mut tracker = tracker(
            root,
            vec![(Transport::Remote, resolver.clone() as Arc<dyn Resolver>)],
            Arc::new(Recorder::default()),
        )
        .unwrap();
        tracker.resolve_all().await.unwrap();

        let order: Vec<&str> = tracker
            .dispatched()
            .iter()
            .map(|d| d.locator.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["example.com/a", "example.com/b", "example.com/c", "example.com/d"]
        );
        // b finished first, but was ingested second
        let calls = resolver.calls.lock().unwrap();
        assert_eq!(calls[0], "example.com/b");
    }

    #[tokio::test]
    async fn test_escaping_import_paths_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let git = DependencySpec {
            git: Some("https://example.com/escaped.git".into()),
            ..spec()
        };
        let root = root_config(tmp.path(), vec![("../../escaped", git)]);
        let resolver = Arc::new(Scripted::default());
        let err = tracker(
            root,
            vec![(Transport::Git, resolver.clone() as Arc<dyn Resolver>)],
            Arc::new(Recorder::default()),
        )
        .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidImport { ref import, .. } if import == "../../escaped"));
        assert!(resolver.calls.lock().unwrap().is_empty());
        assert!(!tmp.path().join("escaped").exists());

        // a fetched manifest is held to the same rule
        let root = root_config(tmp.path(), vec![("example.com/a", spec())]);
        let resolver = Arc::new(Scripted::default().manifest(
            "example.com/a",
            "[package]\nname = \"example.com/a\"\n[dependencies]\n\"\" = { path = \"/tmp\" }\n",
        ));
        let mut tracker = tracker(
            root,
            vec![(Transport::Remote, resolver.clone() as Arc<dyn Resolver>)],
            Arc::new(Recorder::default()),
        )
        .unwrap();
        let err = tracker.resolve_all().await.unwrap_err();
        match err {
            TrackerError::InvalidImport { import, owner } => {
                assert_eq!(import, "");
                assert_eq!(owner, "example.com/a");
            }
            other => panic!("expected an invalid import, got {other}"),
        }
        assert_eq!(tracker.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_resolver_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = root_config(tmp.path(), vec![("example.com/lib", spec())]);
        let mut tracker = tracker(root, Vec::new(), Arc::new(Recorder::default())).unwrap();
        let err = tracker.resolve_all().await.unwrap_err();
        assert!(matches!(err, TrackerError::NoResolver(Transport::Remote)));
    }

    #[tokio::test]
    async fn test_fallback_and_install_only_updated() {
        let tmp = tempfile::tempdir().unwrap();
        let install = DependencySpec {
            install: true,
            ..spec()
        };
        let root = root_config(
            tmp.path(),
            vec![
                ("example.com/tool", install.clone()),
                ("github.com/a/b/cmd/x", install),
            ],
        );
        let fetched = Arc::new(Scripted::default());
        let present = Arc::new(Scripted {
            already_present: true,
            ..Scripted::default()
        });
        let runner = Arc::new(Recorder::default());
        let mut tracker = tracker(
            root,
            vec![
                (Transport::Git, fetched as Arc<dyn Resolver>),
                (Transport::Remote, present as Arc<dyn Resolver>),
            ],
            runner.clone(),
        )
        .unwrap();

        tracker.resolve_all().await.unwrap();
        // the fetched repository has no manifest
        assert_eq!(tracker.needs_fallback(), &[ImportPath::new("github.com/a/b")]);

        let built = tracker.install_all().await.unwrap();
        let ws = tmp.path().join("ws");
        assert_eq!(built, vec![ws.join("bin").join("x")]);
        assert_eq!(tracker.install_set().len(), 2);

        let calls = runner.0.lock().unwrap();
        let lines: Vec<String> = calls.iter().map(Invocation::display).collect();
        assert_eq!(
            lines,
            vec![
                "go get -d github.com/a/b/...".to_string(),
                format!("go build -o {} github.com/a/b/cmd/x", ws.join("bin/x").display()),
            ]
        );
        assert!(calls.iter().all(|c| c.cwd.as_deref() == Some(ws.as_path())));
    }
}

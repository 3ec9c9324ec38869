use provisioner::console::Console;
use provisioner::error::Result;
use provisioner::fetch::{FetchReport, Fetcher};
use provisioner::install::PackageInstaller;
use provisioner::paths::Layout;
use provisioner::pipeline::{ProvisionOutcome, Warning};
use provisioner::service_control::ServiceStarter;
use provisioner::{ProvisionError, Provisioner, RunConfig};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

const ARTIFACT_URL: &str = "https://downloads.test/nxlog-ce.msi";
const TEMPLATE_URL: &str = "https://downloads.test/nxlog.conf";
const INSTALLED_CONF: &[u8] = b"# stock config written by the installer\r\n";
const TEMPLATE: &str = "define ROOT C:\\nxlog\r\n\
define OUTPUT_DESTINATION_ADDRESS usmsensoriphere\r\n\
define OUTPUT_DESTINATION_PORT 514\r\n";

type Journal = Rc<RefCell<Vec<String>>>;

struct FakeFetcher {
  journal: Journal,
  bodies: HashMap<String, Vec<u8>>,
}

impl Fetcher for FakeFetcher {
  fn fetch(&self, local_path: &Path, url: &str, _progress: bool) -> Result<FetchReport> {
    self.journal.borrow_mut().push(format!("fetch {url}"));
    let body = self
      .bodies
      .get(url)
      .ok_or_else(|| ProvisionError::fetch(url, "unexpected HTTP status 404"))?;
    fs::write(local_path, body).map_err(|e| ProvisionError::io("write", local_path, e))?;
    Ok(FetchReport {
      path: local_path.to_path_buf(),
      bytes: body.len() as u64,
      content_length: Some(body.len() as u64),
      sha256: String::new(),
    })
  }
}

struct FakeInstaller {
  journal: Journal,
  fail: bool,
  config_path: PathBuf,
}

impl PackageInstaller for FakeInstaller {
  fn install(&self, artifact: &Path) -> Result<()> {
    self.journal.borrow_mut().push("install".to_string());
    if self.fail {
      return Err(ProvisionError::Install {
        artifact: artifact.to_path_buf(),
        reason: "installer exited with exit code: 1603".to_string(),
      });
    }
    fs::write(&self.config_path, INSTALLED_CONF).unwrap();
    Ok(())
  }
}

struct FakeStarter {
  journal: Journal,
  fail: bool,
}

impl ServiceStarter for FakeStarter {
  fn start(&self, name: &str, args: &[&str], wait: Option<Duration>) -> Result<()> {
    self
      .journal
      .borrow_mut()
      .push(format!("start {name} {} wait={wait:?}", args.join(" ")));
    if self.fail {
      return Err(ProvisionError::service(name, "could not connect to service manager"));
    }
    Ok(())
  }
}

struct Harness {
  _dir: tempfile::TempDir,
  layout: Layout,
  journal: Journal,
  bodies: HashMap<String, Vec<u8>>,
  installer_fails: bool,
  starter_fails: bool,
}

impl Harness {
  fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout {
      artifact_path: dir.path().join("nxlog-ce.msi"),
      artifact_url: ARTIFACT_URL.to_string(),
      config_path: dir.path().join("nxlog.conf"),
      backup_path: dir.path().join("nxlog.old.conf"),
      template_url: TEMPLATE_URL.to_string(),
      service_name: "nxlog".to_string(),
    };
    let mut bodies = HashMap::new();
    bodies.insert(ARTIFACT_URL.to_string(), b"MSI".to_vec());
    bodies.insert(TEMPLATE_URL.to_string(), TEMPLATE.as_bytes().to_vec());

    Self {
      _dir: dir,
      layout,
      journal: Rc::default(),
      bodies,
      installer_fails: false,
      starter_fails: false,
    }
  }

  fn run(&self, cfg: &RunConfig) -> (Result<ProvisionOutcome>, String) {
    let provisioner = Provisioner::new(
      self.layout.clone(),
      FakeFetcher {
        journal: self.journal.clone(),
        bodies: self.bodies.clone(),
      },
      FakeInstaller {
        journal: self.journal.clone(),
        fail: self.installer_fails,
        config_path: self.layout.config_path.clone(),
      },
      FakeStarter {
        journal: self.journal.clone(),
        fail: self.starter_fails,
      },
    );
    let mut console = Console::new(cfg.verbose, Vec::new());
    let res = provisioner.run(cfg, &mut console);
    (res, String::from_utf8(console.into_inner()).unwrap())
  }

  fn journal(&self) -> Vec<String> {
    self.journal.borrow().clone()
  }
}

#[test]
fn full_run_executes_stages_in_order() {
  let h = Harness::new();
  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));
  let outcome = res.unwrap();

  assert!(matches!(outcome, ProvisionOutcome::Completed(_)));
  assert!(outcome.warnings().is_empty());
  assert_eq!(
    h.journal(),
    vec![
      format!("fetch {ARTIFACT_URL}"),
      "install".to_string(),
      format!("fetch {TEMPLATE_URL}"),
      "start nxlog is manual-started wait=None".to_string(),
    ]
  );

  assert_eq!(fs::read(&h.layout.backup_path).unwrap(), INSTALLED_CONF);
  let patched = fs::read_to_string(&h.layout.config_path).unwrap();
  assert!(patched.contains("define OUTPUT_DESTINATION_ADDRESS 10.0.0.5\r\n"));
  assert_eq!(patched, TEMPLATE.replace("usmsensoriphere", "10.0.0.5"));

  let report = outcome.report().unwrap();
  assert_eq!(report.backup_bytes, INSTALLED_CONF.len() as u64);
  assert_eq!(report.patch.replacements, 1);
}

#[test]
fn installer_failure_stops_before_backup_patch_and_start() {
  let mut h = Harness::new();
  h.installer_fails = true;

  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));

  assert!(matches!(res, Err(ProvisionError::Install { .. })));
  assert_eq!(
    h.journal(),
    vec![format!("fetch {ARTIFACT_URL}"), "install".to_string()]
  );
  assert!(!h.layout.backup_path.exists());
  assert!(!h.layout.config_path.exists());
}

#[test]
fn artifact_fetch_failure_stops_everything() {
  let mut h = Harness::new();
  h.bodies.remove(ARTIFACT_URL);

  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));

  assert!(matches!(res, Err(ProvisionError::Fetch { .. })));
  assert_eq!(h.journal(), vec![format!("fetch {ARTIFACT_URL}")]);
}

#[test]
fn template_fetch_failure_leaves_backup_and_skips_start() {
  let mut h = Harness::new();
  h.bodies.remove(TEMPLATE_URL);

  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));

  assert!(matches!(res, Err(ProvisionError::Fetch { .. })));
  assert_eq!(fs::read(&h.layout.backup_path).unwrap(), INSTALLED_CONF);
  assert!(!h.journal().iter().any(|e| e.starts_with("start")));
}

#[test]
fn missing_placeholder_is_a_warning_by_default() {
  let mut h = Harness::new();
  let no_placeholder = b"define OUTPUT_DESTINATION_ADDRESS 192.168.0.1\r\n".to_vec();
  h.bodies.insert(TEMPLATE_URL.to_string(), no_placeholder.clone());

  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));
  let outcome = res.unwrap();

  assert_eq!(
    outcome.warnings(),
    &[Warning::PlaceholderMissing {
      path: h.layout.config_path.clone()
    }]
  );
  assert_eq!(fs::read(&h.layout.config_path).unwrap(), no_placeholder);
  assert!(h.journal().iter().any(|e| e.starts_with("start nxlog")));
}

#[test]
fn missing_placeholder_fails_when_required() {
  let mut h = Harness::new();
  h.bodies.insert(TEMPLATE_URL.to_string(), b"# empty\n".to_vec());
  let cfg = RunConfig {
    require_placeholder: true,
    ..RunConfig::new("10.0.0.5")
  };

  let (res, _) = h.run(&cfg);

  assert!(matches!(res, Err(ProvisionError::PlaceholderMissing { .. })));
  assert!(!h.journal().iter().any(|e| e.starts_with("start")));
}

#[test]
fn service_failure_is_reported_after_config_is_patched() {
  let mut h = Harness::new();
  h.starter_fails = true;

  let (res, _) = h.run(&RunConfig::new("10.0.0.5"));

  let err = res.unwrap_err();
  assert!(matches!(err, ProvisionError::Service { .. }));
  assert_eq!(err.stage(), "service");
  let patched = fs::read_to_string(&h.layout.config_path).unwrap();
  assert!(patched.contains("define OUTPUT_DESTINATION_ADDRESS 10.0.0.5"));
}

#[test]
fn wait_bound_is_forwarded_to_the_starter() {
  let h = Harness::new();
  let cfg = RunConfig {
    wait_running: Some(Duration::from_secs(30)),
    ..RunConfig::new("10.0.0.5")
  };

  h.run(&cfg).0.unwrap();

  assert_eq!(
    h.journal().last().unwrap(),
    "start nxlog is manual-started wait=Some(30s)"
  );
}

#[test]
fn dry_run_touches_nothing() {
  let h = Harness::new();
  let cfg = RunConfig {
    dry_run: true,
    verbose: true,
    ..RunConfig::new("10.0.0.5")
  };

  let (res, out) = h.run(&cfg);

  assert!(matches!(res.unwrap(), ProvisionOutcome::DryRun));
  assert!(h.journal().is_empty());
  assert!(!h.layout.config_path.exists());
  assert!(!h.layout.backup_path.exists());
  assert!(out.contains("DRY-RUN: would run msiexec /i"));
  assert!(out.contains("define OUTPUT_DESTINATION_ADDRESS 10.0.0.5"));
}

#[test]
fn verbose_run_prints_each_step() {
  let h = Harness::new();
  let cfg = RunConfig {
    verbose: true,
    ..RunConfig::new("10.0.0.5")
  };

  let (res, out) = h.run(&cfg);
  res.unwrap();

  let steps = [
    "Download of nxlog started",
    "Installing nxlog",
    "Creating backup of nxlog.conf",
    "Download of nxlog config file started",
    "Setting desired endpoint",
    "Starting nxlog service",
    "Successful configuration of NXLog.",
  ];
  let mut last = 0;
  for step in steps {
    let at = out[last..].find(step).map(|i| i + last);
    assert!(at.is_some(), "missing step: {step}");
    last = at.unwrap();
  }
}

#[test]
fn quiet_run_prints_nothing() {
  let h = Harness::new();
  let (res, out) = h.run(&RunConfig::new("10.0.0.5"));
  res.unwrap();
  assert!(out.is_empty());
}

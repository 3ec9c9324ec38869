use crate::error::{ProvisionError, Result};
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub trait ServiceStarter {
  /// Starts `name` with `args`. With `wait` set, blocks until the service
  /// reports running or the bound elapses; otherwise returns right after the
  /// start request is accepted.
  fn start(&self, name: &str, args: &[&str], wait: Option<Duration>) -> Result<()>;
}

/// Opens a connection to a service control manager. Returned handles release
/// themselves on drop.
pub trait ManagerConnector {
  type Manager: ControlManager;

  fn connect(&self) -> anyhow::Result<Self::Manager>;
}

pub trait ControlManager {
  type Service: ServiceHandle;

  fn open_service(&self, name: &str) -> anyhow::Result<Self::Service>;
}

pub trait ServiceHandle {
  fn start(&self, args: &[&str]) -> anyhow::Result<()>;

  fn is_running(&self) -> anyhow::Result<bool>;
}

pub struct ScmStarter<C> {
  connector: C,
  poll_interval: Duration,
}

impl<C: ManagerConnector> ScmStarter<C> {
  pub fn new(connector: C) -> Self {
    Self {
      connector,
      poll_interval: DEFAULT_POLL_INTERVAL,
    }
  }

  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }
}

impl<C: ManagerConnector> ServiceStarter for ScmStarter<C> {
  fn start(&self, name: &str, args: &[&str], wait: Option<Duration>) -> Result<()> {
    let manager = self
      .connector
      .connect()
      .map_err(|e| ProvisionError::service(name, format!("could not connect to service manager: {e:#}")))?;

    // Declared after `manager`, so the service handle is closed first.
    let service = manager
      .open_service(name)
      .map_err(|e| ProvisionError::service(name, format!("could not access service: {e:#}")))?;

    service
      .start(args)
      .map_err(|e| ProvisionError::service(name, format!("could not start service: {e:#}")))?;
    tracing::info!(stage = "service", service = name, args = ?args, "start requested");

    if let Some(limit) = wait {
      wait_running(&service, name, limit, self.poll_interval)?;
      tracing::info!(stage = "service", service = name, "service is running");
    }

    Ok(())
  }
}

fn wait_running<S: ServiceHandle>(
  service: &S,
  name: &str,
  limit: Duration,
  interval: Duration,
) -> Result<()> {
  let deadline = Instant::now() + limit;
  loop {
    let running = service
      .is_running()
      .map_err(|e| ProvisionError::service(name, format!("could not query status: {e:#}")))?;
    if running {
      return Ok(());
    }
    if Instant::now() >= deadline {
      return Err(ProvisionError::service(
        name,
        format!("not running after {} ms", limit.as_millis()),
      ));
    }
    std::thread::sleep(interval);
  }
}

/// Starter bound to the local machine's service control manager.
pub fn local() -> ScmStarter<LocalScm> {
  ScmStarter::new(LocalScm)
}

pub struct LocalScm;

#[cfg(windows)]
mod scm {
  use super::{ControlManager, LocalScm, ManagerConnector, ServiceHandle};
  use windows_service::service::{Service, ServiceAccess, ServiceState};
  use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

  pub struct WinManager(ServiceManager);
  pub struct WinService(Service);

  impl ManagerConnector for LocalScm {
    type Manager = WinManager;

    fn connect(&self) -> anyhow::Result<WinManager> {
      let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)?;
      Ok(WinManager(manager))
    }
  }

  impl ControlManager for WinManager {
    type Service = WinService;

    fn open_service(&self, name: &str) -> anyhow::Result<WinService> {
      let service = self
        .0
        .open_service(name, ServiceAccess::START | ServiceAccess::QUERY_STATUS)?;
      Ok(WinService(service))
    }
  }

  impl ServiceHandle for WinService {
    fn start(&self, args: &[&str]) -> anyhow::Result<()> {
      self.0.start(args)?;
      Ok(())
    }

    fn is_running(&self) -> anyhow::Result<bool> {
      Ok(self.0.query_status()?.current_state == ServiceState::Running)
    }
  }
}

#[cfg(not(windows))]
mod scm {
  use super::{ControlManager, LocalScm, ManagerConnector, ServiceHandle};

  pub enum Unsupported {}

  impl ManagerConnector for LocalScm {
    type Manager = Unsupported;

    fn connect(&self) -> anyhow::Result<Unsupported> {
      anyhow::bail!("service control is only supported on Windows")
    }
  }

  impl ControlManager for Unsupported {
    type Service = Unsupported;

    fn open_service(&self, _name: &str) -> anyhow::Result<Unsupported> {
      match *self {}
    }
  }

  impl ServiceHandle for Unsupported {
    fn start(&self, _args: &[&str]) -> anyhow::Result<()> {
      match *self {}
    }

    fn is_running(&self) -> anyhow::Result<bool> {
      match *self {}
    }
  }
}

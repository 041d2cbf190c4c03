use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

const HOME_VAR: &str = "CHURN_HOME";

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points `CHURN_HOME` at a scratch directory until dropped.
pub struct ChurnEnvGuard {
    previous: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl ChurnEnvGuard {
    pub fn set_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = std::env::var(HOME_VAR).ok();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(HOME_VAR, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for ChurnEnvGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            Some(value) => unsafe { std::env::set_var(HOME_VAR, value) },
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            None => unsafe { std::env::remove_var(HOME_VAR) },
        }
    }
}

//! The entitlement gate every Pro-gated command consults. Caches the
//! license in memory, read-mostly, guarded by a mutex only for
//! activate/deactivate (spec §4.6 / §5 shared-resources note).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use orbita_kernel::domain::license::{EntitlementModule, License, LicenseStatus};
use orbita_kernel::error::{KernelError, KernelResult};
use orbita_kernel::Clock;
use parking_lot::Mutex;

use super::verifier::LicenseVerifier;

struct State {
    license: License,
}

pub struct EntitlementService {
    state: Mutex<State>,
    verifier: LicenseVerifier,
    clock: Arc<dyn Clock>,
    license_file_path: PathBuf,
}

impl EntitlementService {
    /// Reads the license file at `license_file_path`, creating a fresh
    /// trial document (`trialStartedAt = now`) if it is absent.
    pub fn load_or_init(
        license_file_path: impl AsRef<Path>,
        verifier: LicenseVerifier,
        clock: Arc<dyn Clock>,
    ) -> KernelResult<Self> {
        let path = license_file_path.as_ref().to_path_buf();
        let license = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| KernelError::Infrastructure(format!("corrupt license file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let fresh = License::new_trial(clock.now());
                write_license_file(&path, &fresh)?;
                fresh
            }
            Err(e) => return Err(KernelError::Infrastructure(e.to_string())),
        };
        Ok(EntitlementService {
            state: Mutex::new(State { license }),
            verifier,
            clock,
            license_file_path: path,
        })
    }

    pub fn status(&self) -> LicenseStatus {
        let state = self.state.lock();
        self.verifier.status(&state.license, self.clock.now())
    }

    /// `true` iff the current status grants entitlements and the module
    /// is in the licensed set (entitlement monotonicity, spec §9).
    pub fn has_entitlement(&self, module: EntitlementModule) -> bool {
        let state = self.state.lock();
        let status = self.verifier.status(&state.license, self.clock.now());
        if !status.grants_entitlements() {
            return false;
        }
        if status == LicenseStatus::Trial {
            return true; // trial grants every Pro module (spec §8 scenario 6).
        }
        state
            .license
            .entitlements
            .iter()
            .any(|e| e == module.as_str())
    }

    /// Replace the cached license with a newly activated, signed one and
    /// persist it to disk.
    pub fn activate(&self, license: License) -> KernelResult<()> {
        if !self.verifier.verify(&license) {
            return Err(KernelError::Validation(
                "license signature does not verify".into(),
            ));
        }
        let mut state = self.state.lock();
        write_license_file(&self.license_file_path, &license)?;
        state.license = license;
        Ok(())
    }

    /// Clears the active license, reverting to a fresh trial.
    pub fn deactivate(&self) -> KernelResult<()> {
        let mut state = self.state.lock();
        let fresh = License::new_trial(self.clock.now());
        write_license_file(&self.license_file_path, &fresh)?;
        state.license = fresh;
        Ok(())
    }

    /// Returns `Err(LicenseRequired)` unless `module` is entitled.
    pub fn require(&self, module: EntitlementModule) -> KernelResult<()> {
        if self.has_entitlement(module) {
            Ok(())
        } else {
            Err(KernelError::LicenseRequired {
                module: module.as_str().to_string(),
            })
        }
    }
}

fn write_license_file(path: &Path, license: &License) -> KernelResult<()> {
    let json = serde_json::to_string_pretty(license)
        .map_err(|e| KernelError::Infrastructure(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| KernelError::Infrastructure(e.to_string()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| KernelError::Infrastructure(e.to_string()))?
            .permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)
            .map_err(|e| KernelError::Infrastructure(e.to_string()))?;
    }
    Ok(())
}

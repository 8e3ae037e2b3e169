use criage_schema::{HookPoint, PackageInfo};
use tracing::{debug, info, warn};

use super::{OpsError, PackageManager};
use crate::config::Config;
use crate::hooks::run_hooks;
use crate::store::LocalPackageRegistry;

impl PackageManager {
    /// Remove an installed package from one scope.
    ///
    /// Hook failures are logged and ignored; failing to remove the
    /// directory or the record is terminal. `purge` is accepted for
    /// compatibility and currently changes nothing.
    pub async fn uninstall(&self, name: &str, global: bool, purge: bool) -> Result<PackageInfo, OpsError> {
        let info = self
            .store
            .get(name, global)
            .ok_or_else(|| OpsError::NotInstalled(name.to_string()))?;
        if purge {
            debug!("Purge requested for {name}; nothing beyond the install directory is kept");
        }

        self.reporter.removing(&info.name, &info.version);

        let manifest = match Config::load_local_manifest(&info.install_path) {
            Ok(m) => Some(m),
            Err(e) => {
                debug!("No manifest for {name}, skipping hooks: {e}");
                None
            }
        };

        if let Some(m) = &manifest {
            if let Err(e) = run_hooks(
                HookPoint::PreRemove,
                m.hooks_for(HookPoint::PreRemove),
                Some(&info.install_path),
            )
            .await
            {
                warn!("{e}");
                self.reporter.warning(&format!("Pre-remove hook failed: {e}"));
            }
        }

        let target = info.clone();
        tokio::task::spawn_blocking(move || -> Result<(), OpsError> {
            match std::fs::remove_dir_all(&target.install_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(OpsError::context(
                        "failed to remove package directory",
                        format!("{}: {e}", target.install_path.display()),
                    ));
                }
            }
            LocalPackageRegistry::delete_record(&target)?;
            Ok(())
        })
        .await??;

        self.store.remove(name, global);

        if let Some(m) = &manifest {
            if let Err(e) = run_hooks(HookPoint::PostRemove, m.hooks_for(HookPoint::PostRemove), None).await {
                warn!("{e}");
                self.reporter.warning(&format!("Post-remove hook failed: {e}"));
            }
        }

        self.reporter.done(&info.name, &info.version, "removed", None);
        info!("Removed {} {}", info.name, info.version);
        Ok(info)
    }
}

//! Remove: validate, delete the working directory, drop the record.

use std::fs;

use tracing::{debug, info};

use crate::engine::{validate_name, with_progress, Engine};
use crate::error::{Error, Result};

impl Engine {
    /// Remove a plugin and its registry record. The record only goes
    /// away after the directory is gone, so a failed deletion leaves
    /// the plugin visible for a retry.
    pub fn remove(&self, name: &str, progress: impl FnMut(u8)) -> Result<()> {
        with_progress(progress, |report| self.remove_inner(name, report))
    }

    fn remove_inner(&self, name: &str, report: &mut dyn FnMut(u8)) -> Result<()> {
        report(10);
        validate_name(name)?;
        if !self.store().read()?.contains(name) {
            return Err(Error::NotInstalled {
                name: name.to_string(),
            });
        }
        report(40);

        self.check_cancelled()?;
        self.ensure_layout()?;
        match self.contained_for_deletion(name)? {
            Some(dir) => {
                fs::remove_dir_all(&dir)?;
                debug!(plugin = %name, "Deleted working directory");
            }
            None => {
                debug!(plugin = %name, "No working directory on disk; removing record only");
            }
        }
        report(70);

        self.store().update(|registry| registry.remove(name))?;
        info!(plugin = %name, "Removed plugin");
        Ok(())
    }
}

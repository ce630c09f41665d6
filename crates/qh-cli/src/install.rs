use std::path::Path;

use nu_ansi_term::Color::{Cyan, Green};
use qh_config::config::QhConfig;
use qh_pack::{Installer, UnpackOutcome};
use qh_utils::fs::safe_remove;
use tracing::{debug, info, warn};

use crate::{
    error::CliResult,
    progress::{create_download_job, handle_download_progress},
    utils::Colored,
};

/// Installs every app in `names` and their dependencies that declares a `url`.
///
/// Apps whose path already exists are left alone unless `force` is set, in which case the
/// existing directory is removed first.
pub fn install_apps(config: &QhConfig, names: &[String], force: bool) -> CliResult<()> {
    let apps = config.resolve_apps(names)?;
    let mut installed = 0;

    for app in apps {
        let Some(url) = app.url.as_deref() else {
            debug!("{} has no url, skipping", app.name);
            continue;
        };

        let url = config.expand_within(url, app)?;
        let dest = config.app_path(app)?;

        if dest.exists() {
            if !force {
                info!(
                    "{} is already installed at {}",
                    Colored(Cyan, &app.name),
                    dest.display()
                );
                continue;
            }
            warn!("Removing existing {} at {}", app.name, dest.display());
            safe_remove(&dest)?;
        }

        fetch_into(&app.name, &url, &dest)?;
        installed += 1;
    }

    if installed == 0 {
        debug!("Nothing to install");
    }

    Ok(())
}

/// Downloads `url` and unpacks it into `dest`, showing a progress bar labelled `label`.
pub fn fetch_into(label: &str, url: &str, dest: &Path) -> CliResult<()> {
    let pb = create_download_job(label);
    let installer = {
        let pb = pb.clone();
        Installer::new().progress(move |state| handle_download_progress(state, &pb))
    };

    let result = installer.install(url, dest);
    pb.finish_and_clear();

    match result? {
        UnpackOutcome::Extracted(report) => {
            info!(
                "{} {} ({} files) into {}",
                Colored(Green, "Installed"),
                Colored(Cyan, label),
                report.files,
                dest.display()
            );
        }
        UnpackOutcome::BareFile {
            path, ..
        } => {
            info!(
                "{} {} as {}",
                Colored(Green, "Installed"),
                Colored(Cyan, label),
                path.display()
            );
        }
    }

    Ok(())
}

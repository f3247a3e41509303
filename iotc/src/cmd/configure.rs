use anyhow::Result;
use tracing::info;

use crate::cli::ConfigureArgs;
use crate::config::{DeviceConfig, OtaConfig};
use crate::util::config::{self, StoredConfig};
use crate::util::store::Store;

/// Merge the arguments into the stored configuration and save it
pub async fn configure(args: ConfigureArgs, store: &Store) -> Result<()> {
    if args.reset {
        info!("forgetting stored configuration");
        store.delete(DeviceConfig::default_name()).await?;
        store.delete(OtaConfig::default_name()).await?;
    }

    let device = DeviceConfig::resolve(config::load(store).await?, &args.device)?;
    let ota = config::load::<OtaConfig>(store)
        .await?
        .unwrap_or_default()
        .apply(&args.ota);

    config::save(store, &device).await?;
    config::save(store, &ota).await?;

    info!(
        device_id = %device.device_id,
        platform = ?device.platform,
        "configuration stored in {}",
        store.root().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{DeviceArgs, OtaArgs};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_configure_twice_keeps_earlier_values() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        configure(
            ConfigureArgs {
                reset: false,
                device: DeviceArgs {
                    device_id: Some("acme-01".parse().unwrap()),
                    cpid: Some("ACME".into()),
                    ..Default::default()
                },
                ota: OtaArgs {
                    image_dir: Some(PathBuf::from("/data/images")),
                    ..Default::default()
                },
            },
            &store,
        )
        .await
        .unwrap();

        configure(
            ConfigureArgs {
                reset: false,
                device: DeviceArgs {
                    firmware_version: Some("05.09.24".into()),
                    ..Default::default()
                },
                ota: OtaArgs::default(),
            },
            &store,
        )
        .await
        .unwrap();

        let device: DeviceConfig = config::load(&store).await.unwrap().unwrap();
        assert_eq!(device.device_id.to_string(), "acme-01");
        assert_eq!(device.cpid.as_deref(), Some("ACME"));
        assert_eq!(device.firmware_version, "05.09.24");

        let ota: OtaConfig = config::load(&store).await.unwrap().unwrap();
        assert_eq!(ota.image_dir, PathBuf::from("/data/images"));
    }

    #[tokio::test]
    async fn test_configure_without_device_id_fails() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let res = configure(
            ConfigureArgs {
                reset: false,
                device: DeviceArgs::default(),
                ota: OtaArgs::default(),
            },
            &store,
        )
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_reset_forgets_earlier_values() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let args = |reset, cpid: Option<&str>| ConfigureArgs {
            reset,
            device: DeviceArgs {
                device_id: Some("acme-01".parse().unwrap()),
                cpid: cpid.map(str::to_owned),
                ..Default::default()
            },
            ota: OtaArgs::default(),
        };

        configure(args(false, Some("ACME")), &store).await.unwrap();
        configure(args(true, None), &store).await.unwrap();

        let device: DeviceConfig = config::load(&store).await.unwrap().unwrap();
        assert_eq!(device.cpid, None);
    }
}

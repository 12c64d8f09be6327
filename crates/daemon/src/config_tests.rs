use super::*;
use rbc_core::{AwsConfig, DruidConfig, OutliersConfig, ZooKeeperConfig};

fn app_config() -> AppConfig {
    AppConfig {
        zookeeper: ZooKeeperConfig {
            zk_hosts: "etcd-1:2379,etcd-2:2379".to_string(),
            zk_sync_path: "/rbaioutliers".to_string(),
            zk_name: "node-a".to_string(),
            zk_sleep_time: 3600,
            zk_tick_time: 5,
        },
        aws: AwsConfig {
            s3_public_key: "key".to_string(),
            s3_private_key: "secret".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_bucket: "bucket".to_string(),
            s3_hostname: "https://s3.example.com".to_string(),
        },
        outliers: OutliersConfig {
            epochs: 20,
            batch_size: 32,
            backup_path: "/var/lib/rbc/backups/".to_string(),
            default_model: "traffic".to_string(),
        },
        druid: DruidConfig { druid_endpoint: "http://druid.example.com".to_string() },
    }
}

#[test]
fn translates_zookeeper_and_outliers_sections_onto_the_coordinator_config() {
    let app = app_config();
    let cfg = coordinator_config(&app);
    assert_eq!(cfg.root, "/rbaioutliers");
    assert_eq!(cfg.node_name, "node-a");
    assert_eq!(cfg.tick_time, std::time::Duration::from_secs(5));
    assert_eq!(cfg.sleep_time, std::time::Duration::from_secs(3600));
    assert_eq!(cfg.training.epochs, 20);
    assert_eq!(cfg.training.batch_size, 32);
    assert_eq!(cfg.training.default_model, "traffic");
    assert_eq!(cfg.training.backup_path, std::path::PathBuf::from("/var/lib/rbc/backups/"));
}

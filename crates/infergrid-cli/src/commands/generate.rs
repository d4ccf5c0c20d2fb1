use std::path::Path;

use infergrid_core::workload::{self, WorkloadShape};

pub fn generate(
    servers: u32,
    requests: u32,
    max_capacity: u32,
    seed: u64,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let shape = WorkloadShape {
        servers,
        requests,
        max_capacity,
        seed,
        ..WorkloadShape::default()
    };
    let config = workload::generate(&shape);
    config.validate()?;
    let json = config.to_json_string()?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "✓ Generated {} ({} servers, {} requests)",
                path.display(),
                servers,
                requests
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use infergrid_core::SimConfig;

    #[test]
    fn writes_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("stress.json");

        generate(4, 30, 4, 9, Some(&out)).unwrap();

        let config = SimConfig::from_file(&out).unwrap();
        assert_eq!(config.server_config.len(), 4);
        assert_eq!(config.request_data.len(), 30);
    }

    #[test]
    fn empty_workload_is_rejected() {
        assert!(generate(0, 10, 4, 1, None).is_err());
    }
}

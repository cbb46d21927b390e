use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::ctdi::CtdiPhantom;
use crate::fluence::FluenceScore;
use crate::material::Material;
use crate::room::EnclosedRoom;
use crate::settings::Settings;
use crate::transport::TransportStats;
use crate::world::World;

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kvp: f64, fluence: Vec<(f64, f64)>) -> RunRecord {
        RunRecord {
            kvp,
            ctdiw_target: Some(10.0),
            phantom_ctdiw: Some(10.0),
            wall_dose_mgy: None,
            fluence_overflow: 0.0,
            stats: TransportStats::default(),
            fluence,
        }
    }

    #[test]
    fn fluence_table_is_cut_at_highest_voltage() {
        let air = Material::by_nist_name("Air, Dry (near sea level)").unwrap();
        let bins = |scale: f64| -> Vec<(f64, f64)> {
            (0..5).map(|i| (10.0 * i as f64 + 5.0, scale * i as f64)).collect()
        };
        let runs = vec![run(30.0, bins(1.0)), run(20.0, bins(2.0))];
        let mut buffer = Vec::new();
        write_fluence_table(&mut buffer, &runs, &air).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Energy, u_en_air, 30kVp, 20kVp");
        // bins at 5, 15, 25
        assert_eq!(lines.len(), 4);
        let last: Vec<&str> = lines[3].split(", ").collect();
        assert_eq!(last[0], "25");
        assert_eq!(last[2], "2");
        assert_eq!(last[3], "4");
        let mu: f64 = last[1].parse().unwrap();
        assert!((mu - air.mass_energy_transfer(25.0)).abs() < 1e-12);
    }

    #[test]
    fn mismatched_bins_are_rejected() {
        let air = Material::by_nist_name("Air, Dry (near sea level)").unwrap();
        let runs = vec![run(30.0, vec![(5.0, 1.0)]), run(20.0, vec![])];
        assert!(write_fluence_table(&mut Vec::new(), &runs, &air).is_err());
        assert!(write_fluence_table(&mut Vec::new(), &[], &air).is_err());
    }
}

/// Results of one tube voltage of the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub kvp: f64,
    pub ctdiw_target: Option<f64>,
    /// CTDIw scored in the phantom of the scene (mGy).
    pub phantom_ctdiw: Option<f64>,
    pub wall_dose_mgy: Option<f64>,
    pub fluence_overflow: f64,
    pub stats: TransportStats,
    #[serde(skip)]
    pub fluence: Vec<(f64, f64)>,
}

impl RunRecord {
    /// Collects the scored quantities of `world` after a run.
    pub fn collect(kvp: f64, ctdiw_target: Option<f64>, stats: TransportStats, world: &World) -> Self {
        let score = world.items_of::<FluenceScore>().next();
        Self {
            kvp,
            ctdiw_target,
            phantom_ctdiw: world.items_of::<CtdiPhantom>().next().map(|p| p.ctdiw()),
            wall_dose_mgy: world
                .items_of::<EnclosedRoom>()
                .next()
                .map(|r| r.wall_dose_mgy()),
            fluence_overflow: score.map_or(0.0, |s| s.overflow()),
            stats,
            fluence: score.map(|s| s.get_fluence_spectrum()).unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    timestamp: DateTime<Local>,
    version: &'static str,
    runs: &'a [RunRecord],
}

/// Writes the fluence table, the run summary and the settings used into the
/// output directory.
pub fn writeup(settings: &Settings, runs: &[RunRecord]) -> Result<()> {
    let directory = &settings.output.directory;
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create output directory {:?}", directory))?;

    let air = Material::by_nist_name_with("Air, Dry (near sea level)", &settings.material)?;
    let path = directory.join("fluence.csv");
    let mut writer = BufWriter::new(create(&path)?);
    write_fluence_table(&mut writer, runs, &air)?;
    writer.flush()?;

    write_summary(&directory.join("summary.json"), runs)?;

    let snapshot = toml::to_string_pretty(settings).context("failed to serialise settings")?;
    fs::write(directory.join("settings.toml"), snapshot)?;

    info!("results written to {:?}", directory);
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create {:?}", path))
}

/// Writes `Energy, u_en_air, <kVp>kVp...` rows for every fluence bin up to
/// the highest tube voltage of the sweep.
pub fn write_fluence_table<W: Write>(
    writer: &mut W,
    runs: &[RunRecord],
    air: &Material,
) -> Result<()> {
    let first = runs.first().ok_or_else(|| anyhow!("no runs to write"))?;
    if let Some(run) = runs.iter().find(|r| r.fluence.len() != first.fluence.len()) {
        return Err(anyhow!(
            "fluence spectra differ in length: {} bins at {} kVp, {} at {} kVp",
            first.fluence.len(),
            first.kvp,
            run.fluence.len(),
            run.kvp
        ));
    }
    let max_kvp = runs.iter().map(|r| r.kvp).fold(f64::MIN, f64::max);

    let header = runs.iter().map(|r| format!("{}kVp", r.kvp)).join(", ");
    writeln!(writer, "Energy, u_en_air, {}", header)?;

    for (i, &(energy, _)) in first.fluence.iter().enumerate() {
        if energy > max_kvp {
            continue;
        }
        let values = runs.iter().map(|r| r.fluence[i].1).join(", ");
        writeln!(
            writer,
            "{}, {}, {}",
            energy,
            air.mass_energy_transfer(energy),
            values
        )?;
    }
    Ok(())
}

pub fn write_summary(path: &Path, runs: &[RunRecord]) -> Result<()> {
    let summary = Summary {
        timestamp: Local::now(),
        version: env!("CARGO_PKG_VERSION"),
        runs,
    };
    let writer = BufWriter::new(create(path)?);
    serde_json::to_writer_pretty(writer, &summary).context("failed to write summary")?;
    Ok(())
}

use anyhow::Result;
use ctdose::output::{self, RunRecord};
use ctdose::settings;
use ctdose::transport::Transport;
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = settings::load_config()?;
    info!("{}", settings);

    let mut world = settings.world()?;
    let transport = Transport::new(settings.transport);

    let mut runs = Vec::with_capacity(settings.sweep.tube_voltages.len());
    for &kvp in settings.sweep.tube_voltages.iter() {
        let beam = settings.beam(kvp);
        world.clear_dose_scored();
        let stats = transport.run_console(&mut world, &beam)?;
        let run = RunRecord::collect(kvp, beam.ctdiw(), stats, &world);
        if let Some(ctdiw) = run.phantom_ctdiw {
            info!("{} kVp: phantom CTDIw {:.4} mGy", kvp, ctdiw);
        }
        runs.push(run);
    }

    output::writeup(&settings, &runs)
}

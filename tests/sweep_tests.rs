use ctdose::{
    beam::CtSequentialBeam,
    ctdi::CtdiPhantom,
    error::Error,
    fluence::FluenceScore,
    output::RunRecord,
    room::EnclosedRoom,
    settings::{self, Settings},
    transport::Transport,
    world::World,
};

/// Default scene with few particles and a scorer placed in the primary beam.
fn quick_settings() -> Settings {
    let mut settings = settings::load_default_config().unwrap();
    settings.beam.particles_per_exposure = 500;
    settings.beam.calibration_particles = Some(4000);
    settings.beam.step_angle_deg = 30.0;
    settings.scorer.center = [-40.0, 0.0, 0.0];
    settings.scorer.normal = [1.0, 0.0, 0.0];
    settings.transport.threads = Some(2);
    settings.transport.chunk_size = 128;
    settings
}

fn transport(settings: &Settings) -> Transport {
    let mut transport = Transport::new(settings.transport);
    transport.set_show_progress(false);
    transport
}

fn fluence(world: &World) -> Vec<(f64, f64)> {
    world
        .items_of::<FluenceScore>()
        .next()
        .unwrap()
        .get_fluence_spectrum()
}

#[test]
fn sweep_fluence_stays_below_tube_voltage() {
    let settings = quick_settings();
    let transport = transport(&settings);
    let mut world = settings.world().unwrap();

    for &kvp in settings.sweep.tube_voltages.iter() {
        world.clear_dose_scored();
        let beam = settings.beam(kvp);
        let stats = transport.run_console(&mut world, &beam).unwrap();
        assert!(stats.weight > 0.0);
        assert!(
            stats.energy_balance().abs() < 1e-9 * stats.emitted,
            "{}",
            stats
        );

        let spectrum = fluence(&world);
        assert!(spectrum.iter().all(|&(_, f)| f >= 0.0));
        let scored: Vec<f64> = spectrum
            .iter()
            .filter(|(_, f)| *f > 0.0)
            .map(|(e, _)| *e)
            .collect();
        assert!(!scored.is_empty(), "no fluence scored at {} kVp", kvp);
        let step = settings.scorer.energy_step;
        assert!(scored.iter().all(|&e| e > 0.0 && e < kvp + step), "{} kVp", kvp);

        let run = RunRecord::collect(kvp, beam.ctdiw(), stats, &world);
        assert!(run.phantom_ctdiw.unwrap() > 0.0);
        assert!(run.wall_dose_mgy.unwrap() >= 0.0);
    }
}

#[test]
fn floor_scorer_sees_scatter_below_tube_voltage() {
    let mut settings = settings::load_default_config().unwrap();
    settings.beam.particles_per_exposure = 10_000;
    settings.beam.calibration_particles = Some(2000);
    settings.beam.step_angle_deg = 10.0;
    settings.transport.threads = Some(4);
    assert_eq!(settings.scorer.center, [0.0, 0.0, -450.0]);
    assert_eq!(settings.scorer.radius, 50.0);

    let mut world = settings.world().unwrap();
    let kvp = 140.0;
    let stats = transport(&settings)
        .run_console(&mut world, &settings.beam(kvp))
        .unwrap();
    assert_eq!(stats.histories, 36 * 10_000);

    let score = world.items_of::<FluenceScore>().next().unwrap();
    assert!(score.crossings() > 0);
    let spectrum = score.get_fluence_spectrum();
    assert!(spectrum.iter().all(|&(_, f)| f >= 0.0));
    let step = settings.scorer.energy_step;
    let scored: Vec<f64> = spectrum
        .iter()
        .filter(|(_, f)| *f > 0.0)
        .map(|(e, _)| *e)
        .collect();
    assert!(!scored.is_empty());
    assert!(scored.iter().all(|&e| e > 0.0 && e < kvp + step));
}

#[test]
fn clearing_resets_all_scores() {
    let settings = quick_settings();
    let mut world = settings.world().unwrap();
    let mut beam = settings.beam(120.0);
    beam.clear_ctdiw();
    transport(&settings).run(&mut world, &beam).unwrap();
    assert!(fluence(&world).iter().any(|(_, f)| *f > 0.0));

    world.clear_dose_scored();
    assert!(fluence(&world).iter().all(|(_, f)| *f == 0.0));
    let phantom = world.items_of::<CtdiPhantom>().next().unwrap();
    assert_eq!(phantom.ctdiw(), 0.0);
    let room = world.items_of::<EnclosedRoom>().next().unwrap();
    assert_eq!(room.wall_dose_mgy(), 0.0);
    assert_eq!(world.fill_energy_imparted().energy_imparted, 0.0);
}

#[test]
fn runs_are_reproducible_across_thread_counts() {
    let mut settings = quick_settings();
    let mut beam = settings.beam(100.0);
    beam.clear_ctdiw();

    let mut first = settings.world().unwrap();
    let a = transport(&settings).run(&mut first, &beam).unwrap();

    settings.transport.threads = Some(1);
    let mut second = settings.world().unwrap();
    let b = transport(&settings).run(&mut second, &beam).unwrap();
    assert_eq!(a, b);
    assert_eq!(fluence(&first), fluence(&second));

    settings.transport.seed = 17;
    let mut third = settings.world().unwrap();
    let c = transport(&settings).run(&mut third, &beam).unwrap();
    assert_ne!(a.deposited, c.deposited);
}

#[test]
fn calibrated_scan_reads_target_ctdiw() {
    let settings = quick_settings();
    let mut world = World::new();
    world.add_item::<CtdiPhantom>();
    world.build().unwrap();

    let mut beam = settings.beam(120.0);
    beam.set_calibration_particles(None);
    beam.set_number_of_slices(1);
    let target = beam.ctdiw().unwrap();

    let stats = transport(&settings).run(&mut world, &beam).unwrap();
    let ctdiw = world.items_of::<CtdiPhantom>().next().unwrap().ctdiw();
    assert!(
        ((ctdiw - target) / target).abs() < 1e-9,
        "measured {} target {} weight {}",
        ctdiw,
        target,
        stats.weight
    );
}

#[test]
fn building_twice_gives_the_same_world() {
    let settings = quick_settings();
    let mut world = settings.world().unwrap();
    let bounds = world.bounds();
    world.build().unwrap();
    assert_eq!(world.bounds(), bounds);
    assert_eq!(world.item_count(), 3);
}

#[test]
fn unbuilt_world_and_empty_beam_are_rejected() {
    let settings = quick_settings();
    let transport = transport(&settings);

    let mut world = World::new();
    world.add_item::<CtdiPhantom>();
    let beam = settings.beam(120.0);
    assert_eq!(
        transport.run(&mut world, &beam).unwrap_err(),
        Error::WorldNotBuilt
    );

    let mut world = settings.world().unwrap();
    let mut beam = CtSequentialBeam::default();
    beam.set_particles_per_exposure(0);
    assert!(matches!(
        transport.run(&mut world, &beam),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn room_walls_are_lead_at_standard_density() {
    let settings = quick_settings();
    let world = settings.world().unwrap();
    let room = world.items_of::<EnclosedRoom>().next().unwrap();
    let expected = 11.35;
    let volume = room.outer_aabb().volume() - room.inner_aabb().volume();
    let density = room.wall_mass() / volume;
    assert!((density - expected).abs() < 0.05, "density: {}", density);
}

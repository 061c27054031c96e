//! Unit tests for pre-session intensity adjustment.

use enduro::session::types::{
    Block, BlockType, Discipline, IntensityAdjustment, IntervalSpec, PhaseSpec, SessionError,
    SessionPrescription,
};

fn phase(zone: &str) -> PhaseSpec {
    PhaseSpec {
        duration_seconds: 300,
        target_zone: zone.to_string(),
        description: None,
        cues: Vec::new(),
    }
}

fn block(id: &str, block_type: BlockType, seconds: u32, zone: &str) -> Block {
    Block {
        id: id.to_string(),
        block_type,
        name: id.to_string(),
        duration_seconds: seconds,
        target_zone: zone.to_string(),
        description: None,
        cues: Vec::new(),
        rpe_target: None,
        intervals: None,
    }
}

/// Warmup Z2, tempo 600 s Z3, 4 x (90 s Z4, 30 s rest), cooldown Z1.
fn plan() -> SessionPrescription {
    let mut reps = block("reps", BlockType::Intervals, 480, "Z4");
    reps.intervals = Some(IntervalSpec {
        work_seconds: 90,
        work_zone: "Z4".to_string(),
        rest_seconds: 30,
        repeats: 4,
    });

    SessionPrescription {
        discipline: Discipline::Running,
        session_name: "Tempo and reps".to_string(),
        summary: None,
        warmup: Some(phase("Z2")),
        main_blocks: vec![block("tempo", BlockType::Tempo, 600, "Z3"), reps],
        cooldown: Some(phase("Z1")),
    }
}

#[test]
fn test_harder_raises_zones_and_load() {
    let adjusted = plan().adjust_intensity(IntensityAdjustment::Harder).unwrap();
    let plan = &adjusted.prescription;

    assert_eq!(plan.warmup.as_ref().unwrap().target_zone, "Z3");
    assert_eq!(plan.warmup.as_ref().unwrap().duration_seconds, 300);
    assert_eq!(plan.cooldown.as_ref().unwrap().target_zone, "Z2");

    let tempo = &plan.main_blocks[0];
    assert_eq!(tempo.target_zone, "Z4");
    assert_eq!(tempo.duration_seconds, 690);

    let reps = &plan.main_blocks[1];
    let spec = reps.intervals.as_ref().unwrap();
    assert_eq!(reps.target_zone, "Z5");
    assert_eq!(spec.work_zone, "Z5");
    assert_eq!(spec.work_seconds, 108);
    // Harder means less rest
    assert_eq!(spec.rest_seconds, 23);
    assert_eq!(spec.repeats, 5);
    assert_eq!(reps.duration_seconds, (108 + 23) * 5);

    assert!(adjusted.changes.iter().any(|c| c.block_id == "tempo"
        && c.field == "duration_seconds"
        && c.old_value == "600"
        && c.new_value == "690"));
    assert!(plan.validate().is_ok());
}

#[test]
fn test_easier_lowers_zones_and_load() {
    let adjusted = plan().adjust_intensity(IntensityAdjustment::Easier).unwrap();
    let plan = &adjusted.prescription;

    assert_eq!(plan.warmup.as_ref().unwrap().target_zone, "Z1");
    // Already at the bottom of the scale
    assert_eq!(plan.cooldown.as_ref().unwrap().target_zone, "Z1");
    assert!(adjusted.changes.iter().all(|c| c.block_id != "cooldown"));

    assert_eq!(plan.main_blocks[0].target_zone, "Z2");
    assert_eq!(plan.main_blocks[0].duration_seconds, 510);

    let reps = &plan.main_blocks[1];
    let spec = reps.intervals.as_ref().unwrap();
    assert_eq!(spec.work_seconds, 72);
    assert_eq!(spec.rest_seconds, 38);
    assert_eq!(spec.repeats, 3);
    assert_eq!(reps.duration_seconds, 330);
}

#[test]
fn test_limits_leave_plan_unchanged() {
    // Reps are at Z5 after one step
    let harder = plan()
        .adjust_intensity(IntensityAdjustment::Harder)
        .unwrap()
        .prescription;
    assert!(matches!(
        harder.adjust_intensity(IntensityAdjustment::Harder),
        Err(SessionError::IntensityLimit(IntensityAdjustment::Harder))
    ));

    let mut single_rep = plan();
    single_rep.main_blocks[1].intervals.as_mut().unwrap().repeats = 1;
    assert!(matches!(
        single_rep.adjust_intensity(IntensityAdjustment::Easier),
        Err(SessionError::IntensityLimit(IntensityAdjustment::Easier))
    ));

    let mut many_reps = plan();
    many_reps.main_blocks[1].intervals.as_mut().unwrap().repeats = 12;
    assert!(many_reps.adjust_intensity(IntensityAdjustment::Harder).is_err());
}

#[test]
fn test_durations_have_floors() {
    let mut short = plan();
    short.main_blocks[0].duration_seconds = 60;
    let spec = short.main_blocks[1].intervals.as_mut().unwrap();
    spec.work_seconds = 60;
    spec.rest_seconds = 0;

    let adjusted = short
        .adjust_intensity(IntensityAdjustment::Easier)
        .unwrap()
        .prescription;

    assert_eq!(adjusted.main_blocks[0].duration_seconds, 60);
    let spec = adjusted.main_blocks[1].intervals.as_ref().unwrap();
    assert_eq!(spec.work_seconds, 60);
    // No rest stays no rest
    assert_eq!(spec.rest_seconds, 0);
}

#[test]
fn test_parse_direction() {
    assert_eq!("harder".parse::<IntensityAdjustment>(), Ok(IntensityAdjustment::Harder));
    assert_eq!("Easier".parse::<IntensityAdjustment>(), Ok(IntensityAdjustment::Easier));
    assert!("medium".parse::<IntensityAdjustment>().is_err());
}

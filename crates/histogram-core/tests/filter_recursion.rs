use histogram_core::{
    ControlledTransition, DiscreteDistribution, DistributionError, HistogramFilter,
    LikelihoodTable, MeasurementUpdate, PosteriorMetrics, SensorLikelihood, SystemUpdate,
    TransitionMatrix,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f64 = 1e-9;

fn check_invariants(dist: &DiscreteDistribution) {
    let mass = dist.probabilities();
    let sum: f64 = mass.iter().sum();
    assert!((sum - dist.weight_sum()).abs() < TOLERANCE * sum.max(1.0));

    let cumulative = dist.cumulative();
    assert_eq!(cumulative.len(), mass.len() + 1);
    assert_eq!(cumulative[0], 0.0);
    assert_eq!(cumulative[mass.len()], 1.0);
    assert!(
        cumulative.windows(2).all(|pair| pair[0] <= pair[1]),
        "cumulative table is not monotone: {cumulative:?}"
    );
}

fn random_matrix(rng: &mut SmallRng, states: usize) -> TransitionMatrix {
    let rows = (0..states)
        .map(|_| {
            let raw: Vec<f64> = (0..states).map(|_| rng.r#gen::<f64>() + 0.01).collect();
            let total: f64 = raw.iter().sum();
            raw.into_iter().map(|value| value / total).collect()
        })
        .collect();
    TransitionMatrix::new(rows).unwrap()
}

#[test]
fn invariants_hold_across_random_recursion() {
    let mut rng = SmallRng::seed_from_u64(4242);
    let states = 12;
    let transition = random_matrix(&mut rng, states);
    let likelihood = LikelihoodTable::new(
        (0..3)
            .map(|_| (0..states).map(|_| rng.r#gen::<f64>()).collect())
            .collect(),
    )
    .unwrap();

    let prior = DiscreteDistribution::new(states);
    let mut filter: HistogramFilter = HistogramFilter::new(&prior);
    check_invariants(filter.posterior());

    for step in 0..200 {
        let observation: usize = step % 3;
        filter
            .update(
                Some(SystemUpdate::new(&transition)),
                Some(MeasurementUpdate::new(&likelihood, &observation)),
            )
            .unwrap();
        check_invariants(filter.posterior());
    }
}

#[test]
fn invariants_hold_after_point_mutations() {
    let mut rng = SmallRng::seed_from_u64(8);
    let mut dist = DiscreteDistribution::new(6);
    for _ in 0..100 {
        let state = rng.gen_range(0..6);
        let value = rng.gen_range(0.0..5.0);
        match dist.set_probability(state, value) {
            Ok(()) => check_invariants(&dist),
            Err(DistributionError::Degenerate { .. }) => {
                dist.set_probability(state, 1.0).unwrap();
                check_invariants(&dist);
            }
            Err(other) => panic!("unexpected error {other}"),
        }
    }
}

#[test]
fn localization_on_a_ring_converges() {
    // Ten cells on a ring, doors at cells 0, 3 and 7; the robot moves one cell per step.
    let states = 10;
    let doors = [0usize, 3, 7];
    let mut forward = vec![vec![0.0; states]; states];
    for (from, row) in forward.iter_mut().enumerate() {
        row[(from + 1) % states] = 0.9;
        row[from] = 0.1;
    }
    let mut stay = vec![vec![0.0; states]; states];
    for (from, row) in stay.iter_mut().enumerate() {
        row[from] = 1.0;
    }
    let motion = ControlledTransition::new(vec![
        TransitionMatrix::new(stay).unwrap(),
        TransitionMatrix::new(forward).unwrap(),
    ])
    .unwrap();

    let door_row: Vec<f64> = (0..states)
        .map(|cell| if doors.contains(&cell) { 0.9 } else { 0.1 })
        .collect();
    let wall_row: Vec<f64> = door_row.iter().map(|p| 1.0 - p).collect();
    let sensor = SensorLikelihood::new(vec![
        LikelihoodTable::new(vec![wall_row, door_row]).unwrap(),
        LikelihoodTable::new(vec![vec![0.5; states], vec![0.5; states]]).unwrap(),
    ])
    .unwrap();

    let mut filter: HistogramFilter = HistogramFilter::new(&DiscreteDistribution::new(states));
    let mut position = 0usize;
    let first = PosteriorMetrics::from_distribution(filter.posterior()).unwrap();

    for _ in 0..25 {
        position = (position + 1) % states;
        let observation = usize::from(doors.contains(&position));
        filter
            .update(
                Some(SystemUpdate::with_control(&motion, 1)),
                Some(MeasurementUpdate::with_sensor(&sensor, &observation, 0)),
            )
            .unwrap();
    }

    let last = PosteriorMetrics::from_distribution(filter.posterior()).unwrap();
    assert!(last.entropy < first.entropy);
    assert_eq!(last.map_state, position);
}

#[test]
fn uninformative_sensor_leaves_belief_unchanged() {
    let sensor = SensorLikelihood::new(vec![
        LikelihoodTable::new(vec![vec![0.9, 0.1]]).unwrap(),
        LikelihoodTable::new(vec![vec![0.5, 0.5]]).unwrap(),
    ])
    .unwrap();
    let prior = DiscreteDistribution::from_probabilities(vec![0.3, 0.7]).unwrap();
    let mut filter: HistogramFilter = HistogramFilter::new(&prior);
    filter
        .update(None, Some(MeasurementUpdate::with_sensor(&sensor, &0usize, 1)))
        .unwrap();
    let posterior = filter.posterior().normalized_probabilities().unwrap();
    assert!((posterior[0] - 0.3).abs() < TOLERANCE);
    assert!((posterior[1] - 0.7).abs() < TOLERANCE);
}

#[test]
fn filter_recovers_after_degenerate_step_when_reset() {
    let prior = DiscreteDistribution::new(2);
    let mut filter: HistogramFilter = HistogramFilter::new(&prior);
    let impossible = LikelihoodTable::new(vec![vec![0.0, 0.0], vec![0.5, 0.5]]).unwrap();

    let err = filter
        .update(None, Some(MeasurementUpdate::new(&impossible, &0usize)))
        .unwrap_err();
    assert!(matches!(err, DistributionError::Degenerate { .. }));
    assert!(filter.posterior().is_stale());

    let mut fresh: HistogramFilter = HistogramFilter::new(&prior);
    fresh
        .update(None, Some(MeasurementUpdate::new(&impossible, &1usize)))
        .unwrap();
    assert!(!fresh.posterior().is_stale());
}

#[test]
fn long_runs_of_small_likelihoods_do_not_underflow() {
    let likelihood = LikelihoodTable::new(vec![vec![1e-3, 2e-3, 1e-3, 1e-3]]).unwrap();
    let mut filter: HistogramFilter = HistogramFilter::new(&DiscreteDistribution::new(4));

    for step in 0..400 {
        filter
            .update(None, Some(MeasurementUpdate::new(&likelihood, &0usize)))
            .unwrap_or_else(|err| panic!("step {step} failed: {err}"));
        check_invariants(filter.posterior());
    }

    let posterior = filter.posterior().normalized_probabilities().unwrap();
    assert!((posterior[1] - 1.0).abs() < TOLERANCE);
    assert_eq!(filter.posterior().most_probable_state(), Ok(1));
}

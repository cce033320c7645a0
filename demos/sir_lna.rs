use faer::Mat;
use lna_paths::{AdaptiveMomentSolver, ForcingSchedule, LnaInput, LnaOptions, propose_lna_path};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Parameters: `[beta, mu, popsize, S0, I0, R0, vaccinations]`.
fn sir_moments(_t: f64, state: &[f64], params: &[f64], derivative: &mut [f64]) {
    let infections = state[0].exp_m1();
    let recoveries = state[1].exp_m1();
    let s = params[3] - infections;
    let i = params[4] + infections - recoveries;
    let hazards = [(params[0] * s * i / params[2]).max(0.0), (params[1] * i).max(0.0)];
    derivative.fill(0.0);
    for event in 0..2 {
        let decay = (-state[event]).exp();
        derivative[event] = decay * hazards[event];
        derivative[2 + 3 * event] = decay * decay * hazards[event];
    }
}

fn main() {
    let n_times = 21;
    let times: Vec<f64> = (0..n_times).map(|t| 0.5 * idx_to_f64(t)).collect();
    let trajectory = Mat::from_fn(n_times, 7, |row, col| match col {
        0 => 0.8,
        1 => 0.25,
        2 => 1_000.0,
        3 => 990.0,
        4 => 10.0,
        5 => 0.0,
        _ => if row % 4 == 0 { 15.0 } else { 0.0 },
    });
    let stoichiometry = Mat::from_fn(3, 2, |i, j| match (i, j) {
        (0, 0) | (1, 1) => -1.0,
        (1, 0) | (2, 1) => 1.0,
        _ => 0.0,
    });
    // vaccinate susceptibles straight into R every two time units
    let vaccination = ForcingSchedule::new(
        (0..n_times).map(|row| row > 0 && row % 4 == 0).collect(),
        vec![6],
        Mat::from_fn(3, 1, |i, _| if i == 0 { 1.0 } else { 0.0 }),
        vec![Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => -1.0,
            (2, 0) => 1.0,
            _ => 0.0,
        })],
    );
    let input = LnaInput::new(times, trajectory, stoichiometry, 3)
        .with_parameter_columns(0..3)
        .with_time_varying(6..7, vec![true; n_times])
        .with_forcing(vaccination);

    let options = LnaOptions {
        step_size: 0.01,
        max_attempts: 50,
        ..LnaOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(42);
    let proposal = propose_lna_path(
        &input,
        options,
        &mut AdaptiveMomentSolver::new(sir_moments),
        &mut rng,
    )
    .expect("proposal");

    println!("attempts: {}", proposal.attempts);
    println!("{:>6} {:>10} {:>10} {:>10} {:>10}", "time", "S2I", "S", "I", "R");
    for row in 0..proposal.path.n_times() {
        let increments = proposal.path.increments_at(row);
        let volumes = proposal.path.volumes_at(row);
        println!(
            "{:>6.1} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            proposal.path.incidence[(row, 0)],
            increments[0],
            volumes[0],
            volumes[1],
            volumes[2]
        );
    }
}

fn idx_to_f64(idx: usize) -> f64 {
    f64::from(u32::try_from(idx).unwrap_or(u32::MAX))
}

// tests/generative.rs
use glam::{Mat4, Vec3};
use std::cell::RefCell;
use std::rc::Rc;
use turtle_swarm::{CloneMode, Flow, Hsla, Pool, PoolConfig, Rule, START, Transform, Turtle};

type Log = Rc<RefCell<Vec<(Vec<Vec3>, Hsla, u32)>>>;

fn setup(rule: Rule, config: PoolConfig) -> (Pool, Log) {
    let mut pool = Pool::new(rule, config).unwrap();
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    pool.set_renderer(move |v: &[Vec3], c: Hsla, f: u32| {
        sink.borrow_mut().push((v.to_vec(), c, f));
    });
    (pool, log)
}

fn run_to_end(pool: &mut Pool, max_rounds: u64) {
    while !pool.is_finished() {
        assert!(pool.round() < max_rounds, "swarm did not settle");
        pool.step();
    }
}

// --- Branching swarm ---

fn branch(t: &mut Turtle, pool: &mut Pool) -> Flow {
    match t.resume_point() {
        START => {
            pool.square(t, &Transform::new().scale_y(0.2));
            pool.transform(t, &Transform::new().lightness(-0.01));
            Flow::Yield(1)
        }
        _ => {
            if pool.brand(0.1) {
                pool.transform(t, &Transform::new().flip(0.0));
                pool.spawn(t, branch, &Transform::new().rotate(-90.0));
            }
            let wobble = pool.pm(0.0, 1.0);
            pool.transform(
                t,
                &Transform::new()
                    .translate(0.4, 0.0)
                    .rotate(wobble)
                    .translate(0.4, 0.0)
                    .scale(0.95),
            );
            Flow::Jump(branch)
        }
    }
}

fn seed_branches(t: &mut Turtle, pool: &mut Pool) -> Flow {
    pool.transform(t, &Transform::new().scale_normalize().scale(0.2).lightness(1.0));
    pool.circle(t, &[]);
    for _ in 0..4 {
        let angle = pool.pm(0.0, 180.0);
        pool.spawn(
            t,
            branch,
            &Transform::new().rotate(angle).scale(0.1).translate(1.0, 0.0),
        );
    }
    Flow::Kill
}

fn swarm_config(seed: u64) -> PoolConfig {
    PoolConfig {
        capacity: 64,
        seed,
        initial_pose: Some(Mat4::from_scale(Vec3::new(640.0, 480.0, 1.0))),
        ..Default::default()
    }
}

#[test_log::test]
fn branching_swarm_settles_deterministically() {
    let (mut a, log_a) = setup(seed_branches, swarm_config(7));
    run_to_end(&mut a, 5_000);
    let (mut b, log_b) = setup(seed_branches, swarm_config(7));
    run_to_end(&mut b, 5_000);

    assert_eq!(a.round(), b.round());
    assert_eq!(*log_a.borrow(), *log_b.borrow());

    let log = log_a.borrow();
    // The seed circle plus at least one square per branch round.
    assert!(log.len() > 4);
    assert_eq!(log[0].0.len(), 32);
    assert!(log.iter().all(|(v, _, _)| v.iter().all(|p| p.is_finite())));
    // Lightness only ever decreases from the seed's full white.
    assert!(log.iter().all(|(_, c, _)| c.lightness <= 1.0));
}

// --- Counted loop with a yield inside ---

fn moon(t: &mut Turtle, pool: &mut Pool) -> Flow {
    const LOOP: u32 = 1;
    match t.resume_point() {
        START => {
            t.index = 0;
            t.count = 32;
            Flow::Goto(LOOP)
        }
        LOOP if t.index < t.count => {
            pool.circle(t, &[]);
            pool.transform(t, &Transform::new().scale(0.95).lightness(0.01));
            t.index += 1;
            Flow::Yield(LOOP)
        }
        _ => Flow::Kill,
    }
}

#[test_log::test]
fn looping_rule_keeps_counter_across_rounds() {
    let config = PoolConfig {
        capacity: 1,
        initial_pose: Some(Mat4::from_scale(Vec3::splat(100.0))),
        ..Default::default()
    };
    let (mut pool, log) = setup(moon, config);
    run_to_end(&mut pool, 100);
    assert_eq!(pool.round(), 33);

    let log = log.borrow();
    assert_eq!(log.len(), 32);
    let radii: Vec<f32> = log.iter().map(|(v, _, _)| v[0].length()).collect();
    assert!((radii[0] - 50.0).abs() < 1e-3);
    assert!(radii.windows(2).all(|w| w[1] < w[0]));
}

// --- Block loop: one blocking child per iteration ---

const BODY: u32 = 1;
const NEXT: u32 = 2;

fn columns(t: &mut Turtle, pool: &mut Pool) -> Flow {
    match t.resume_point() {
        START => {
            t.index = 0;
            t.count = 4;
            Flow::Goto(NEXT)
        }
        NEXT if t.index < t.count => {
            let x = t.index as f32;
            t.index += 1;
            pool.fork(t, CloneMode::Call, &Transform::new().translate(x, 0.0), BODY);
            Flow::Await(BODY)
        }
        NEXT => Flow::Kill,
        _ => {
            if t.take_just_cloned() {
                pool.square(t, &Transform::new().saturation(1.0));
                return Flow::Kill;
            }
            Flow::Goto(NEXT)
        }
    }
}

#[test_log::test]
fn block_loop_emits_one_body_per_round() {
    let (mut pool, log) = setup(columns, PoolConfig::default());
    let parent = pool.turtles().next().unwrap().0;

    pool.step();
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(pool.turtle(parent).unwrap().index, 1);

    run_to_end(&mut pool, 10);
    // Four bodies, one per round, then one more round for the parent to finish.
    assert_eq!(pool.round(), 5);

    let log = log.borrow();
    let centers: Vec<f32> = log
        .iter()
        .map(|(v, _, _)| v.iter().map(|p| p.x).sum::<f32>() / v.len() as f32)
        .collect();
    assert_eq!(centers, [0.0, 1.0, 2.0, 3.0]);
    assert!(log.iter().all(|(_, c, _)| c.saturation == 1.0));
}

//! Integration tests for the budget RL engine
//!
//! These tests drive the environment, agent and training loop together
//! through the public API.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::sync::atomic::AtomicBool;

use budget_core::{AllocationVector, Category, RiskPreference, UserProfile};
use budget_rl::{
    AgentConfig, BudgetAction, BudgetEnvironment, Checkpoint, DqnAgent, Recommender, ReplayBuffer,
    TrainingConfig, TrainingLoop, Transition, ACTION_COUNT, EPISODE_LENGTH,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Helper function to create the reference profile
fn create_test_profile() -> UserProfile {
    UserProfile::new(50000.0, RiskPreference::Moderate).unwrap()
}

fn create_test_env() -> BudgetEnvironment {
    BudgetEnvironment::new(create_test_profile()).unwrap()
}

fn small_agent_config() -> AgentConfig {
    AgentConfig {
        batch_size: 8,
        buffer_capacity: 128,
        hidden_sizes: vec![16, 16],
        ..AgentConfig::default()
    }
}

fn random_action(rng: &mut StdRng) -> BudgetAction {
    BudgetAction::from_index(rng.gen_range(0..ACTION_COUNT)).unwrap()
}

fn assert_close(a: &[f64], b: &[f64], tolerance: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert!((x - y).abs() < tolerance, "{x} vs {y}");
    }
}

/// Allocation stays normalized across randomized episodes
#[test]
fn test_allocation_sum_invariant() {
    let mut env = create_test_env();
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..1000 {
        env.reset();
        for _ in 0..EPISODE_LENGTH {
            let result = env.step(random_action(&mut rng));
            let total = env.allocation().total();
            assert!((total - 1.0).abs() < 1e-6, "total drifted to {total}");
            assert!(env.allocation().as_array().iter().all(|v| *v >= 0.0));
            assert!(result.warning.is_none());
        }
    }
}

/// Hold never changes the reward when no floor is crossed
#[test]
fn test_hold_reward_is_zero_from_any_state() {
    let mut env = create_test_env();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        env.reset();
        let warmup = rng.gen_range(0..EPISODE_LENGTH);
        for _ in 0..warmup {
            env.step(random_action(&mut rng));
        }
        let allocation = *env.allocation();
        if allocation.savings() < 0.05 || allocation.get(Category::Food) < 0.05 {
            continue;
        }

        let result = env.step(BudgetAction::Hold);
        assert_eq!(result.reward, 0.0);
        assert_eq!(env.allocation(), &allocation);
    }
}

/// AggressiveSave never decreases savings while every variable category is positive
#[test]
fn test_aggressive_save_is_monotonic() {
    let mut env = create_test_env();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..200 {
        env.reset();
        for _ in 0..EPISODE_LENGTH - 1 {
            let allocation = *env.allocation();
            if !Category::VARIABLE.iter().all(|c| allocation.get(*c) > 0.0) {
                break;
            }
            let before = allocation.savings();
            let mut trial = env.clone();
            trial.step(BudgetAction::AggressiveSave);
            assert!(trial.allocation().savings() >= before);

            env.step(random_action(&mut rng));
        }
    }
}

/// Scenario: shift from savings into discretionary spend
#[test]
fn test_loosen_discretionary_scenario() {
    let mut env = create_test_env();
    env.reset();
    assert_eq!(
        env.allocation().as_array(),
        &[0.20, 0.30, 0.15, 0.10, 0.10, 0.10, 0.05]
    );

    env.step(BudgetAction::from_index(7).unwrap());
    assert_close(
        env.allocation().as_array(),
        &[0.19, 0.30, 0.15, 0.10, 0.105, 0.105, 0.05],
        1e-12,
    );
}

/// Scenario: twelve holds end the episode exactly at step twelve
#[test]
fn test_no_op_episode() {
    let mut env = create_test_env();
    env.reset();

    let mut total_reward = 0.0;
    for step in 1..=EPISODE_LENGTH {
        let result = env.step(BudgetAction::Hold);
        total_reward += result.reward;
        assert_eq!(result.done, step == EPISODE_LENGTH);
    }

    assert_eq!(env.current_step(), 12);
    assert_eq!(total_reward, 0.0);
}

/// Test epsilon decay across learning steps
#[test]
fn test_epsilon_non_increasing_and_floored() {
    let config = AgentConfig {
        epsilon_decay: 0.9,
        epsilon_min: 0.2,
        ..small_agent_config()
    };
    let mut agent = DqnAgent::with_seed(config, Some(1)).unwrap();
    let mut env = create_test_env();
    let mut state = env.reset();

    let mut previous = agent.epsilon();
    let mut floored = false;
    for _ in 0..120 {
        let action = agent.select_action(&state, true);
        let result = env.step(action);
        agent.remember(Transition::new(
            state,
            action,
            result.reward,
            result.observation,
            result.done,
        ));
        state = if result.done { env.reset() } else { result.observation };

        if agent.learn().is_some() {
            let epsilon = agent.epsilon();
            assert!(epsilon <= previous);
            assert!(epsilon >= 0.2);
            if floored {
                assert_eq!(epsilon, 0.2);
            }
            floored |= epsilon == 0.2;
            previous = epsilon;
        }
    }
    assert!(floored, "epsilon should reach its floor");
}

/// Test replay buffer FIFO eviction
#[test]
fn test_replay_buffer_evicts_first_transition() {
    let capacity = 32;
    let mut buffer = ReplayBuffer::new(capacity);
    let mut env = create_test_env();
    let state = env.reset();

    for i in 0..=capacity {
        let result = env.step(BudgetAction::Hold);
        buffer.remember(Transition::new(
            state,
            BudgetAction::Hold,
            i as f64,
            result.observation,
            false,
        ));
        env.reset();
    }

    assert_eq!(buffer.len(), capacity);
    assert!(buffer.iter().all(|t| t.reward != 0.0));
}

/// Scenario: synced networks agree on arbitrary observations
#[test]
fn test_sync_makes_networks_identical() {
    let mut agent = DqnAgent::with_seed(small_agent_config(), Some(3)).unwrap();
    let mut env = create_test_env();
    let mut state = env.reset();

    for _ in 0..40 {
        let action = agent.select_action(&state, true);
        let result = env.step(action);
        agent.remember(Transition::new(state, action, result.reward, result.observation, result.done));
        agent.learn();
        state = if result.done { env.reset() } else { result.observation };
    }

    let obs_after = env.observation();
    assert_ne!(agent.q_values(&obs_after), agent.target_q_values(&obs_after));

    agent.sync_target_network();
    let mut rng = StdRng::seed_from_u64(5);
    env.reset();
    for _ in 0..EPISODE_LENGTH {
        let obs = env.step(random_action(&mut rng)).observation;
        assert_eq!(agent.q_values(&obs), agent.target_q_values(&obs));
    }
}

/// Test checkpoint round trip, including a missing epsilon
#[test]
fn test_checkpoint_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.json");

    let source = DqnAgent::with_seed(small_agent_config(), Some(8)).unwrap();
    let mut checkpoint = source.checkpoint(None);
    checkpoint.epsilon = None;
    checkpoint.save(&path).unwrap();

    let mut restored = DqnAgent::with_seed(small_agent_config(), Some(21)).unwrap();
    restored.load(&path).unwrap();

    assert_eq!(restored.epsilon(), 0.01);
    let obs = create_test_env().reset();
    assert_close(&restored.q_values(&obs), &source.q_values(&obs), 1e-9);
    assert_eq!(restored.q_values(&obs), restored.target_q_values(&obs));
}

/// Test a corrupt checkpoint is surfaced, not replaced by a fresh agent
#[test]
fn test_corrupt_checkpoint_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.json");
    std::fs::write(&path, "not json").unwrap();

    let mut agent = DqnAgent::with_seed(small_agent_config(), Some(8)).unwrap();
    let before = agent.policy_network().clone();

    assert!(agent.load(&path).unwrap_err().is_checkpoint_load());
    assert!(Recommender::from_checkpoint(&path).unwrap_err().is_checkpoint_load());
    assert_eq!(agent.policy_network(), &before);
    assert_eq!(agent.epsilon(), 1.0);
}

/// The persisted policy equals the target network at save time
#[test]
fn test_target_synced_before_save() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        episodes: 7,
        target_sync_interval: 5,
        checkpoint_path: dir.path().join("agent.json"),
        seed: Some(12),
        ..TrainingConfig::default()
    };
    let mut training =
        TrainingLoop::new(create_test_profile(), small_agent_config(), config).unwrap();
    let report = training.run().unwrap();

    let agent = training.agent();
    let obs = create_test_env().reset();
    assert_eq!(agent.q_values(&obs), agent.target_q_values(&obs));

    let checkpoint = Checkpoint::load(&report.checkpoint_path).unwrap();
    let mut restored = DqnAgent::with_seed(small_agent_config(), None).unwrap();
    restored.restore(checkpoint).unwrap();
    assert_close(&restored.target_q_values(&obs), &agent.target_q_values(&obs), 1e-9);
    assert!((restored.epsilon() - report.final_epsilon).abs() < 1e-12);
}

/// Test a short training run end to end
#[test]
fn test_training_run_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        episodes: 20,
        log_interval: 5,
        checkpoint_path: dir.path().join("nested").join("agent.json"),
        checkpoint_interval: Some(10),
        seed: Some(4),
        ..TrainingConfig::default()
    };
    let mut training =
        TrainingLoop::new(create_test_profile(), small_agent_config(), config).unwrap();
    let report = training.run().unwrap();

    assert_eq!(report.episodes_completed, 20);
    assert_eq!(report.rewards_history.len(), 20);
    assert!(!report.cancelled);
    assert_eq!(report.run_id, training.run_id());
    assert_eq!(report.learn_steps, (20 * EPISODE_LENGTH - 7) as u64);
    assert!(report.final_epsilon >= 0.01 && report.final_epsilon < 1.0);
    assert!(report.rewards_history.iter().all(|r| r.is_finite()));

    let checkpoint = Checkpoint::load(&report.checkpoint_path).unwrap();
    assert_eq!(checkpoint.run_id, Some(report.run_id));
}

/// Identical seeds give identical runs
#[test]
fn test_training_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let run = |name: &str| {
        let config = TrainingConfig {
            episodes: 5,
            checkpoint_path: dir.path().join(name),
            seed: Some(77),
            ..TrainingConfig::default()
        };
        TrainingLoop::new(create_test_profile(), small_agent_config(), config)
            .unwrap()
            .run()
            .unwrap()
    };

    let a = run("a.json");
    let b = run("b.json");
    assert_eq!(a.rewards_history, b.rewards_history);
    assert_eq!(a.final_epsilon, b.final_epsilon);
}

/// Test cooperative cancellation still publishes a checkpoint
#[test]
fn test_cancelled_run_persists_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        episodes: 1000,
        checkpoint_path: dir.path().join("agent.json"),
        seed: Some(6),
        ..TrainingConfig::default()
    };
    let mut training =
        TrainingLoop::new(create_test_profile(), small_agent_config(), config).unwrap();

    let report = training.run_with_cancel(&AtomicBool::new(true)).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.episodes_completed, 0);
    assert!(Checkpoint::load(&report.checkpoint_path).is_ok());
}

/// Test inference from a trained checkpoint against a history baseline
#[test]
fn test_recommend_from_trained_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        episodes: 3,
        checkpoint_path: dir.path().join("agent.json"),
        seed: Some(10),
        ..TrainingConfig::default()
    };
    let mut training =
        TrainingLoop::new(create_test_profile(), small_agent_config(), config).unwrap();
    let report = training.run().unwrap();

    let recommender = Recommender::from_checkpoint(&report.checkpoint_path).unwrap();
    let baseline =
        AllocationVector::from_fractions([0.10, 0.35, 0.20, 0.10, 0.10, 0.10, 0.05]).unwrap();
    let rec = recommender
        .recommend_from(&create_test_profile(), baseline)
        .unwrap();

    assert_eq!(rec.observation.savings(), 0.10);
    assert_eq!(rec.action, training.agent().greedy_action(&rec.observation));
}

use super::*;
use rbc_artifacts::FakeArtifactStore;
use rbc_coordination::{FakeCoordinationClient, FakeShared};
use rbc_core::FakeClock;
use rbc_training::{FakeQueryEngine, FakeTrainer};
use std::time::Duration as StdDuration;
use tempfile::tempdir;

fn training_config(workspace: std::path::PathBuf) -> rbc_training::TrainingConfig {
    rbc_training::TrainingConfig {
        artifact_prefix: "rbaioutliers/latest/".to_string(),
        default_model: "traffic".to_string(),
        epochs: 1,
        batch_size: 8,
        backup_path: workspace.join("backup"),
        workspace,
    }
}

fn config(workspace: std::path::PathBuf, node_name: &str) -> CoordinatorConfig {
    CoordinatorConfig {
        root: "/rbaioutliers".to_string(),
        node_name: node_name.to_string(),
        tick_time: StdDuration::from_millis(5),
        sleep_time: StdDuration::from_millis(5),
        training: training_config(workspace),
    }
}

/// A simulated node: the [`Coordinator`] under test plus a direct handle
/// to its fake coordination session, so a test can call
/// [`FakeCoordinationClient::lose_session`] to simulate a crash without
/// going through `CoordinationClient`'s object-safe interface. `trainer`
/// is likewise a direct handle so a test can flip `set_failing` to drive
/// the training-failure branch of `follower_tick`.
struct Node {
    coordinator: Arc<Coordinator<FakeClock>>,
    session: Arc<FakeCoordinationClient>,
    trainer: Arc<FakeTrainer>,
}

async fn make_node(shared: &Arc<FakeShared>, node_name: &str, seed_store: Option<Arc<FakeArtifactStore>>) -> Node {
    make_node_with_trainer(shared, node_name, seed_store, Arc::new(FakeTrainer::new())).await
}

async fn make_node_with_trainer(
    shared: &Arc<FakeShared>,
    node_name: &str,
    seed_store: Option<Arc<FakeArtifactStore>>,
    trainer: Arc<FakeTrainer>,
) -> Node {
    let dir = tempdir().unwrap();
    let session = Arc::new(FakeCoordinationClient::join(shared));
    let client: Arc<dyn CoordinationClient> = session.clone();
    let store = seed_store.unwrap_or_else(|| Arc::new(FakeArtifactStore::new()));
    let query_engine: Arc<dyn QueryEngine> = Arc::new(FakeQueryEngine::new());
    let trainer_port: Arc<dyn Trainer> = trainer.clone();
    let clock = FakeClock::new();
    let cfg = config(dir.path().to_path_buf(), node_name);
    let coordinator = Coordinator::new(client, store, query_engine, trainer_port, clock, cfg).await.unwrap();
    Node { coordinator: Arc::new(coordinator), session, trainer }
}

fn seeded_store(models: &[&str]) -> Arc<FakeArtifactStore> {
    let store = FakeArtifactStore::new();
    for model in models {
        store.seed(format!("rbaioutliers/latest/{model}.weights"), b"w".to_vec());
        store.seed(format!("rbaioutliers/latest/{model}.config"), b"c".to_vec());
    }
    Arc::new(store)
}

/// Regression test for an etcd election bug: `Coordinator::new`
/// `ensure_path`s every coordinator path, including the election path
/// itself, before any node ever joins the election (see `all()` in
/// `paths.rs`). A real defect here CASed directly on that same ensured
/// path, which is then at version >= 1 and can never satisfy a
/// version-absent check. This drives the fake election through the same
/// `nodes` store `ensure_path` populates (rather than a separate lock
/// map) so it exercises that interaction instead of bypassing it.
#[tokio::test]
async fn election_can_be_won_after_its_container_path_is_already_ensured() {
    let shared = FakeShared::new();
    let client: Arc<dyn CoordinationClient> = Arc::new(FakeCoordinationClient::join(&shared));
    let paths = CoordinatorPaths::new("/rbaioutliers");
    for path in paths.all() {
        client.ensure_path(path).await.unwrap();
    }

    let election = client.election(&paths.election, "n1");
    let won = election.acquire(StdDuration::from_millis(50)).await.unwrap();
    assert!(won, "election must be winnable even though its container path was already ensured");
}

#[tokio::test]
async fn participate_wins_election_when_no_leader_exists() {
    let shared = FakeShared::new();
    let node = make_node(&shared, "n1", None).await;
    node.coordinator.participate().await.unwrap();
    assert!(node.coordinator.is_leader());
    assert_eq!(
        node.coordinator.client.current_leader(&node.coordinator.paths.leader).await.unwrap().as_deref(),
        Some("n1")
    );
}

#[tokio::test]
async fn participate_defers_to_an_existing_leader() {
    let shared = FakeShared::new();
    let n1 = make_node(&shared, "n1", None).await;
    let n2 = make_node(&shared, "n2", None).await;
    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    assert!(n1.coordinator.is_leader());
    assert!(!n2.coordinator.is_leader());
}

#[tokio::test]
async fn sweep_enqueues_every_discovered_model() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha", "beta"]);
    let node = make_node(&shared, "n1", Some(store)).await;
    node.coordinator.sweep().await.unwrap();
    let size = node.coordinator.client.queue(&node.coordinator.paths.queue).size().await.unwrap();
    assert_eq!(size, 2);
}

#[tokio::test]
async fn sweep_with_an_empty_store_enqueues_nothing() {
    let shared = FakeShared::new();
    let node = make_node(&shared, "n1", None).await;
    node.coordinator.sweep().await.unwrap();
    let size = node.coordinator.client.queue(&node.coordinator.paths.queue).size().await.unwrap();
    assert_eq!(size, 0);
}

#[tokio::test]
async fn inspect_markers_requeues_abandoned_claims() {
    let shared = FakeShared::new();
    let node = make_node(&shared, "leader", None).await;
    let client = &node.coordinator.client;
    let paths = &node.coordinator.paths;
    client.create(&paths.taken_marker("alpha"), b"n2", false).await.unwrap();

    node.coordinator.inspect_markers().await.unwrap();

    assert!(!client.exists(&paths.taken_marker("alpha")).await.unwrap());
    let size = client.queue(&paths.queue).size().await.unwrap();
    assert_eq!(size, 1);
}

#[tokio::test]
async fn inspect_markers_leaves_live_claims_alone() {
    let shared = FakeShared::new();
    let node = make_node(&shared, "leader", None).await;
    let client = &node.coordinator.client;
    let paths = &node.coordinator.paths;
    client.create(&paths.taken_marker("alpha"), b"n2", false).await.unwrap();
    client.create(&paths.train_marker("alpha"), b"n2", true).await.unwrap();

    node.coordinator.inspect_markers().await.unwrap();

    assert!(client.exists(&paths.taken_marker("alpha")).await.unwrap());
    let size = client.queue(&paths.queue).size().await.unwrap();
    assert_eq!(size, 0);
}

/// Scenario 1: happy path, two nodes, two models.
#[tokio::test]
async fn happy_path_trains_every_model_and_clears_all_markers() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha", "beta"]);
    let n1 = make_node(&shared, "n1", Some(store.clone())).await;
    let n2 = make_node(&shared, "n2", Some(store)).await;

    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    assert!(n1.coordinator.is_leader());
    n1.coordinator.sweep().await.unwrap();

    n2.coordinator.follower_tick().await;
    n2.coordinator.follower_tick().await;

    let paths = &n1.coordinator.paths;
    assert!(!n1.coordinator.client.exists(&paths.taken_marker("alpha")).await.unwrap());
    assert!(!n1.coordinator.client.exists(&paths.taken_marker("beta")).await.unwrap());
    assert!(!n1.coordinator.client.exists(&paths.train_marker("alpha")).await.unwrap());
    assert!(!n1.coordinator.client.exists(&paths.train_marker("beta")).await.unwrap());
}

/// Scenario 2: follower crash mid-training is requeued on the leader's
/// next sweep, via `inspect_markers` observing TAKEN without TRAIN.
#[tokio::test]
async fn follower_crash_mid_training_is_requeued_by_the_leader() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let n1 = make_node(&shared, "n1", Some(store.clone())).await;
    let n2 = make_node(&shared, "n2", Some(store)).await;
    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    n1.coordinator.sweep().await.unwrap();

    let queue = n2.coordinator.client.queue(&n2.coordinator.paths.queue);
    let (lease, payload) = queue.get(StdDuration::from_millis(50)).await.unwrap().unwrap();
    let model = String::from_utf8(payload).unwrap();
    n2.coordinator.client.create(&n2.coordinator.paths.train_marker(&model), b"n2", true).await.unwrap();
    queue.consume(lease).await.unwrap();
    n2.coordinator.client.create(&n2.coordinator.paths.taken_marker(&model), b"n2", false).await.unwrap();

    // n2 crashes: its session, and with it the ephemeral TRAIN marker, is gone.
    n2.session.lose_session();

    n1.coordinator.inspect_markers().await.unwrap();

    let paths = &n1.coordinator.paths;
    assert!(!n1.coordinator.client.exists(&paths.taken_marker(&model)).await.unwrap());
    assert_eq!(n1.coordinator.client.queue(&paths.queue).size().await.unwrap(), 1);
}

/// Scenario 3: leader crash, a new leader takes over and resumes sweeping.
#[tokio::test]
async fn leader_crash_hands_over_to_the_surviving_node() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let n1 = make_node(&shared, "n1", Some(store.clone())).await;
    let n2 = make_node(&shared, "n2", Some(store)).await;
    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    assert!(n1.coordinator.is_leader());
    assert!(!n2.coordinator.is_leader());

    // n1 crashes: its session, and with it the ephemeral LEADER key, is gone.
    n1.session.lose_session();

    n2.coordinator.participate().await.unwrap();
    assert!(n2.coordinator.is_leader());
    n2.coordinator.sweep().await.unwrap();
    assert_eq!(n2.coordinator.client.queue(&n2.coordinator.paths.queue).size().await.unwrap(), 1);
}

/// Scenario 4: empty store, follower's dequeue attempt times out, no
/// markers are ever created.
#[tokio::test]
async fn empty_store_creates_no_markers() {
    let shared = FakeShared::new();
    let n1 = make_node(&shared, "n1", None).await;
    let n2 = make_node(&shared, "n2", None).await;
    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    n1.coordinator.sweep().await.unwrap();

    n2.coordinator.follower_tick().await;

    let paths = &n1.coordinator.paths;
    assert!(n1.coordinator.client.children(&paths.taken).await.unwrap().is_empty());
    assert!(n1.coordinator.client.children(&paths.train).await.unwrap().is_empty());
}

/// Scenario 5: session loss evaporates TRAIN while TAKEN remains; the
/// leader requeues within one sweep.
#[tokio::test]
async fn session_loss_evaporates_train_marker_leader_requeues() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let n1 = make_node(&shared, "n1", Some(store.clone())).await;
    let n2 = make_node(&shared, "n2", Some(store)).await;
    n1.coordinator.participate().await.unwrap();
    n2.coordinator.participate().await.unwrap();
    n1.coordinator.sweep().await.unwrap();

    let queue = n2.coordinator.client.queue(&n2.coordinator.paths.queue);
    let (lease, payload) = queue.get(StdDuration::from_millis(50)).await.unwrap().unwrap();
    let model = String::from_utf8(payload).unwrap();
    n2.coordinator.client.create(&n2.coordinator.paths.train_marker(&model), b"n2", true).await.unwrap();
    queue.consume(lease).await.unwrap();
    n2.coordinator.client.create(&n2.coordinator.paths.taken_marker(&model), b"n2", false).await.unwrap();

    n2.session.lose_session();

    n1.coordinator.inspect_markers().await.unwrap();

    let paths = &n1.coordinator.paths;
    assert!(!n1.coordinator.client.exists(&paths.train_marker(&model)).await.unwrap());
    assert!(!n1.coordinator.client.exists(&paths.taken_marker(&model)).await.unwrap());
    assert_eq!(n1.coordinator.client.queue(&paths.queue).size().await.unwrap(), 1);
}

/// Scenario 6: two followers race on the same queue entry; exactly one
/// receives it.
#[tokio::test]
async fn two_followers_racing_on_dequeue_only_one_wins() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let n1 = make_node(&shared, "n1", Some(store.clone())).await;
    let n2 = make_node(&shared, "n2", Some(store)).await;
    n1.coordinator.client.queue(&n1.coordinator.paths.queue).put(b"alpha".to_vec()).await.unwrap();

    let queue1 = n1.coordinator.client.queue(&n1.coordinator.paths.queue);
    let queue2 = n2.coordinator.client.queue(&n2.coordinator.paths.queue);
    let (a, b) = tokio::join!(
        queue1.get(StdDuration::from_millis(20)),
        queue2.get(StdDuration::from_millis(20)),
    );
    let got_one = a.unwrap().is_some();
    let got_two = b.unwrap().is_some();
    assert!(got_one ^ got_two, "exactly one follower should receive the queued item");
}

/// P2: `exists(TRAIN/m) => exists(TAKEN/m)` at every observation point
/// between actions, across randomized schedules of participation,
/// sweeps, follower claims, and session crashes on a 3-node cluster.
/// Each action runs to completion before the invariant is checked, which
/// is exactly the "observation point" the property is scoped to — the
/// spec carves out the follower's own in-tick window between creating
/// TRAIN and creating TAKEN, which this harness never observes because
/// `follower_tick` is awaited to completion as a single action.
mod p2_train_implies_taken {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Action {
        Participate,
        Sweep,
        FollowerTick,
        Crash,
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::Participate),
            Just(Action::Sweep),
            Just(Action::FollowerTick),
            Just(Action::Crash),
        ]
    }

    async fn check_invariant(nodes: &[Node]) {
        let client = &nodes[0].coordinator.client;
        let paths = &nodes[0].coordinator.paths;
        for model in client.children(&paths.train).await.unwrap() {
            assert!(
                client.exists(&paths.taken_marker(&model)).await.unwrap(),
                "model {model} has a TRAIN marker but no TAKEN marker"
            );
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn holds_across_randomized_schedules(
            actions in prop::collection::vec((0usize..3, action_strategy()), 1..40)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let shared = FakeShared::new();
                let store = seeded_store(&["alpha", "beta", "gamma"]);
                let names = ["n1", "n2", "n3"];
                let mut nodes = Vec::with_capacity(3);
                for name in names {
                    nodes.push(make_node(&shared, name, Some(store.clone())).await);
                }

                for (idx, action) in actions {
                    match action {
                        Action::Participate => {
                            let _ = nodes[idx].coordinator.participate().await;
                        }
                        Action::Sweep => {
                            if nodes[idx].coordinator.is_leader() {
                                let _ = nodes[idx].coordinator.sweep().await;
                                let _ = nodes[idx].coordinator.inspect_markers().await;
                            }
                        }
                        Action::FollowerTick => {
                            nodes[idx].coordinator.follower_tick().await;
                        }
                        Action::Crash => {
                            nodes[idx].session.lose_session();
                        }
                    }
                    check_invariant(&nodes).await;
                }
            });
        }
    }
}

#[tokio::test]
async fn follower_tick_drops_duplicate_delivery_without_disturbing_the_live_claim() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let node = make_node(&shared, "n2", Some(store)).await;
    let paths = &node.coordinator.paths;
    node.coordinator.client.create(&paths.leader, b"n1", true).await.unwrap();
    node.coordinator.client.create(&paths.train_marker("alpha"), b"someone-else", true).await.unwrap();
    node.coordinator.client.queue(&paths.queue).put(b"alpha".to_vec()).await.unwrap();

    node.coordinator.follower_tick().await;

    // The pre-existing TRAIN marker survives untouched; no TAKEN marker
    // was created by this follower for a model it never actually claimed.
    assert!(node.coordinator.client.exists(&paths.train_marker("alpha")).await.unwrap());
    assert!(!node.coordinator.client.exists(&paths.taken_marker("alpha")).await.unwrap());
    assert_eq!(node.coordinator.client.queue(&paths.queue).size().await.unwrap(), 0);
}

/// §7: "the follower deletes its TAKEN marker and moves on... the leader
/// will observe no abnormal state (both markers clean)". A training
/// failure must clear TRAIN as well as TAKEN — the follower's session (and
/// therefore its ephemeral TRAIN marker) is still alive on this path, so a
/// surviving TRAIN marker would hide the model from every future sweep
/// and it would never be retrained again.
#[tokio::test]
async fn follower_tick_on_training_failure_clears_both_markers_and_model_is_reclaimable() {
    let shared = FakeShared::new();
    let store = seeded_store(&["alpha"]);
    let trainer = Arc::new(FakeTrainer::new());
    trainer.set_failing(true);
    let node = make_node_with_trainer(&shared, "n2", Some(store), trainer.clone()).await;
    let paths = &node.coordinator.paths;
    node.coordinator.client.create(&paths.leader, b"n1", true).await.unwrap();
    node.coordinator.client.queue(&paths.queue).put(b"alpha".to_vec()).await.unwrap();

    node.coordinator.follower_tick().await;

    assert!(!node.coordinator.client.exists(&paths.taken_marker("alpha")).await.unwrap());
    assert!(!node.coordinator.client.exists(&paths.train_marker("alpha")).await.unwrap());

    // Nothing stops a fresh delivery from being claimed afterward: the
    // model is genuinely reclaimable, not stuck behind a stale TRAIN
    // marker as it would be if the failure path had left TRAIN in place.
    trainer.set_failing(false);
    node.coordinator.client.queue(&paths.queue).put(b"alpha".to_vec()).await.unwrap();
    node.coordinator.follower_tick().await;

    assert!(!node.coordinator.client.exists(&paths.taken_marker("alpha")).await.unwrap());
    assert!(!node.coordinator.client.exists(&paths.train_marker("alpha")).await.unwrap());
    assert_eq!(trainer.invocation_count(), 1);
}

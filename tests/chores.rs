mod common;

use std::time::Duration;

use common::{chore, settle, Harness};
use house_sync::model::{Chore, ChoreStatus};
use house_sync::realtime::RawChange;
use house_sync::{ChoreSync, NoticeCategory};
use tokio::time::sleep;

fn ids(chores: &ChoreSync) -> Vec<String> {
    chores.chores().into_iter().map(|c| c.id).collect()
}

#[tokio::test(start_paused = true)]
async fn unscoped_insert_appends_highlights_and_notifies() {
    let h = Harness::live();
    h.store.set_chores(vec![chore("c1", Some("p1"))]);
    let mut notices = h.notifier.subscribe();
    let chores = ChoreSync::mount(h.context(), None).await;

    h.backend
        .emit("chores:all", RawChange::insert(&chore("c2", None)).unwrap());
    settle().await;

    assert_eq!(ids(&chores), vec!["c1", "c2"]);
    assert_eq!(chores.highlighted().as_deref(), Some("c2"));
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.message, "New chore: chore c2");
    assert_eq!(notice.category, NoticeCategory::Info);

    sleep(Duration::from_millis(1_999)).await;
    assert_eq!(chores.highlighted().as_deref(), Some("c2"));
    sleep(Duration::from_millis(2)).await;
    assert_eq!(chores.highlighted(), None);
}

#[tokio::test]
async fn duplicate_insert_does_not_duplicate() {
    let h = Harness::live();
    let chores = ChoreSync::mount(h.context(), None).await;

    for _ in 0..2 {
        h.backend
            .emit("chores:all", RawChange::insert(&chore("c1", None)).unwrap());
    }
    settle().await;

    assert_eq!(ids(&chores), vec!["c1"]);
}

#[tokio::test]
async fn scope_filters_load_and_inserts() {
    let h = Harness::live();
    h.store
        .set_chores(vec![chore("c1", Some("p1")), chore("c2", Some("p2"))]);
    let chores = ChoreSync::mount(h.context(), Some("p1".to_string())).await;

    assert_eq!(ids(&chores), vec!["c1"]);
    let binding = h.backend.binding("chores:player:p1").unwrap();
    assert_eq!(binding.filter.as_deref(), Some("assigned_to=eq.p1"));

    h.backend.emit(
        "chores:player:p1",
        RawChange::insert(&chore("c3", Some("p2"))).unwrap(),
    );
    h.backend.emit(
        "chores:player:p1",
        RawChange::insert(&chore("c4", Some("p1"))).unwrap(),
    );
    settle().await;

    assert_eq!(ids(&chores), vec!["c1", "c4"]);
}

#[tokio::test]
async fn reassignment_moves_chores_across_scope() {
    let h = Harness::live();
    h.store.set_chores(vec![chore("c1", Some("p1"))]);
    let chores = ChoreSync::mount(h.context(), Some("p1".to_string())).await;

    // Out of scope: evicted.
    h.backend.emit(
        "chores:player:p1",
        RawChange::update(&chore("c1", Some("p2")), Some(&chore("c1", Some("p1")))).unwrap(),
    );
    settle().await;
    assert!(ids(&chores).is_empty());

    // Into scope: spliced in even though it was never cached.
    h.backend.emit(
        "chores:player:p1",
        RawChange::update(&chore("c9", Some("p1")), None).unwrap(),
    );
    settle().await;
    assert_eq!(ids(&chores), vec!["c9"]);
}

#[tokio::test]
async fn unscoped_update_of_unknown_chore_is_ignored() {
    let h = Harness::live();
    h.store.set_chores(vec![chore("c1", None)]);
    let chores = ChoreSync::mount(h.context(), None).await;

    h.backend
        .emit("chores:all", RawChange::update(&chore("zz", None), None).unwrap());
    settle().await;

    assert_eq!(ids(&chores), vec!["c1"]);
    assert_eq!(chores.highlighted(), None);
}

#[tokio::test]
async fn completion_publishes_success_once() {
    let h = Harness::live();
    h.store.set_chores(vec![chore("c1", Some("p1"))]);
    let mut notices = h.notifier.subscribe();
    let chores = ChoreSync::mount(h.context(), None).await;

    let mut done = chore("c1", Some("p1"));
    done.status = ChoreStatus::Completed;
    h.backend.emit(
        "chores:all",
        RawChange::update(&done, Some(&chore("c1", Some("p1")))).unwrap(),
    );
    // Re-delivery of an already completed chore stays quiet.
    h.backend
        .emit("chores:all", RawChange::update(&done, Some(&done)).unwrap());
    settle().await;

    assert_eq!(chores.chores()[0].status, ChoreStatus::Completed);
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.message, "Chore completed: chore c1");
    assert_eq!(notice.category, NoticeCategory::Success);
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn delete_removes_by_id() {
    let h = Harness::live();
    h.store
        .set_chores(vec![chore("c1", None), chore("c2", None)]);
    let chores = ChoreSync::mount(h.context(), None).await;

    h.backend.emit("chores:all", RawChange::delete_key("c1"));
    settle().await;

    assert_eq!(ids(&chores), vec!["c2"]);
}

#[tokio::test]
async fn changing_scope_rebinds_and_reloads() {
    let h = Harness::live();
    h.store.set_chores(vec![
        chore("c1", Some("p1")),
        chore("c2", Some("p2")),
        chore("c3", None),
    ]);
    let mut chores = ChoreSync::mount(h.context(), None).await;
    assert_eq!(ids(&chores).len(), 3);

    chores.set_player_scope(Some("p2".to_string())).await;

    assert_eq!(chores.player_scope().as_deref(), Some("p2"));
    assert_eq!(ids(&chores), vec!["c2"]);
    assert!(!h.backend.is_open("chores:all"));
    assert!(h.backend.is_open("chores:player:p2"));
    assert_eq!(h.manager.active_subscriptions(), 1);

    chores.set_player_scope(None).await;
    assert_eq!(ids(&chores).len(), 3);
    assert!(h.backend.is_open("chores:all"));
}

/// Reference merge for a scoped chore list.
fn apply(model: &mut Vec<Chore>, scope: &str, change: &Step) {
    let admits = |c: &Chore| c.assigned_to.as_deref() == Some(scope);
    match change {
        Step::Insert(c) => {
            if admits(c) {
                match model.iter_mut().find(|m| m.id == c.id) {
                    Some(existing) => *existing = c.clone(),
                    None => model.push(c.clone()),
                }
            }
        }
        Step::Update(c) => {
            let index = model.iter().position(|m| m.id == c.id);
            match (index, admits(c)) {
                (Some(i), true) => model[i] = c.clone(),
                (Some(i), false) => {
                    model.remove(i);
                }
                (None, true) => model.push(c.clone()),
                (None, false) => {}
            }
        }
        Step::Delete(id) => model.retain(|m| &m.id != id),
    }
}

enum Step {
    Insert(Chore),
    Update(Chore),
    Delete(String),
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[tokio::test]
async fn scoped_list_matches_reference_model() {
    let h = Harness::live();
    let chores = ChoreSync::mount(h.context(), Some("p1".to_string())).await;
    let players = [Some("p1"), Some("p2"), None];
    let mut model: Vec<Chore> = Vec::new();
    let mut rng = Lcg(7);

    for _ in 0..200 {
        let id = format!("c{}", rng.next(8));
        let assigned = players[rng.next(3) as usize];
        let mut row = chore(&id, assigned);
        row.points = rng.next(20) as i64;

        let (step, raw) = match rng.next(3) {
            0 => (Step::Insert(row.clone()), RawChange::insert(&row).unwrap()),
            1 => (Step::Update(row.clone()), RawChange::update(&row, None).unwrap()),
            _ => (Step::Delete(id.clone()), RawChange::delete_key(&id)),
        };

        apply(&mut model, "p1", &step);
        h.backend.emit("chores:player:p1", raw);
        settle().await;

        let current = chores.chores();
        assert_eq!(current, model);
        assert!(current
            .iter()
            .all(|c| c.assigned_to.as_deref() == Some("p1")));
    }
}

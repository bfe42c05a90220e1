//! Directory state machine: the cached record list, the search query, the
//! selected record, and whether the add panel is open.
//!
//! Every transition is applied to the whole state in one step and a failed
//! transition leaves that state exactly as it was. Mutations are split into
//! `begin_*` and [`DirectoryController::complete`] so a caller can run the
//! store call elsewhere (see [`crate::worker::StoreWorker`]); while one is in
//! flight every further mutation is refused with [`VaultError::Busy`].

use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::notice::{NoticeKind, Notifier};
use crate::record::{ProfileDraft, ProfileRecord};
use crate::search;
use crate::store::{ListOrder, RecordStore};

/// Blocking yes/no prompt consulted before a delete.
pub trait Confirm {
    fn confirm_delete(&mut self, record: &ProfileRecord) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&ProfileRecord) -> bool,
{
    fn confirm_delete(&mut self, record: &ProfileRecord) -> bool {
        self(record)
    }
}

/// A store call handed out by `begin_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(ProfileDraft),
    Delete { id: String },
}

impl Mutation {
    /// Run the call against `store`.
    pub fn execute(self, store: &dyn RecordStore) -> MutationOutcome {
        match self {
            Self::Create(draft) => MutationOutcome::Created(store.create(draft)),
            Self::Delete { id } => {
                let result = store.delete(&id);
                MutationOutcome::Deleted { id, result }
            }
        }
    }
}

/// Result of a [`Mutation`], fed back through `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Created(Result<ProfileRecord>),
    Deleted { id: String, result: Result<()> },
}

/// What `complete` applied to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(ProfileRecord),
    Deleted { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The prompt was declined; nothing was sent to the store.
    Cancelled,
}

pub struct DirectoryController<N: Notifier> {
    store: Arc<dyn RecordStore>,
    notifier: N,
    records: Vec<ProfileRecord>,
    query: String,
    selection: Option<String>,
    add_panel_open: bool,
    in_flight: bool,
}

impl<N: Notifier> DirectoryController<N> {
    pub fn new(store: Arc<dyn RecordStore>, notifier: N) -> Self {
        Self {
            store,
            notifier,
            records: Vec::new(),
            query: String::new(),
            selection: None,
            add_panel_open: false,
            in_flight: false,
        }
    }

    /// Load the full list. On failure the cache stays as it was (empty at
    /// startup) and the error is reported.
    pub fn on_start(&mut self) -> Result<()> {
        self.reload("load")
    }

    /// Re-read the list. A selection survives only if its record still exists.
    pub fn on_refresh(&mut self) -> Result<()> {
        self.reload("refresh")?;
        if let Some(id) = &self.selection {
            if !self.records.iter().any(|r| &r.id == id) {
                self.selection = None;
            }
        }
        Ok(())
    }

    fn reload(&mut self, what: &str) -> Result<()> {
        if self.in_flight {
            return Err(VaultError::Busy);
        }
        match self.store.list_all() {
            Ok(records) => {
                tracing::info!(
                    backend = %self.store.backend(),
                    count = records.len(),
                    "{what} complete"
                );
                self.records = records;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "{what} failed");
                self.notifier
                    .notify(NoticeKind::Error, &format!("Failed to {what} records: {err}"));
                Err(err)
            }
        }
    }

    pub fn on_query_change(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn on_add_requested(&mut self) {
        self.add_panel_open = true;
    }

    pub fn on_add_panel_closed(&mut self) {
        self.add_panel_open = false;
    }

    /// Select the record with `id`; unknown ids are ignored.
    pub fn on_select(&mut self, id: &str) {
        if self.records.iter().any(|r| r.id == id) {
            self.selection = Some(id.to_string());
        }
    }

    pub fn on_deselect(&mut self) {
        self.selection = None;
    }

    /// Validate locally and hand back the create call. The store is not
    /// touched when a required field is blank.
    pub fn begin_add(&mut self, draft: ProfileDraft) -> Result<Mutation> {
        self.start_add(draft).map(Mutation::Create)
    }

    /// Confirm and hand back the delete call. `Ok(None)` when the prompt is
    /// declined.
    pub fn begin_delete(
        &mut self,
        id: &str,
        confirm: &mut impl Confirm,
    ) -> Result<Option<Mutation>> {
        Ok(self
            .start_delete(id, confirm)?
            .map(|id| Mutation::Delete { id }))
    }

    fn start_add(&mut self, draft: ProfileDraft) -> Result<ProfileDraft> {
        if self.in_flight {
            return Err(VaultError::Busy);
        }
        let draft = draft.normalized();
        if let Err(err) = draft.validate() {
            self.notifier.notify(NoticeKind::Error, &err.to_string());
            return Err(err);
        }
        self.in_flight = true;
        Ok(draft)
    }

    fn start_delete(&mut self, id: &str, confirm: &mut impl Confirm) -> Result<Option<String>> {
        if self.in_flight {
            return Err(VaultError::Busy);
        }
        let Some(record) = self.records.iter().find(|r| r.id == id) else {
            let err = VaultError::not_found(id);
            self.notifier.notify(NoticeKind::Error, &err.to_string());
            return Err(err);
        };
        if !confirm.confirm_delete(record) {
            tracing::debug!(id, "delete cancelled at prompt");
            return Ok(None);
        }
        self.in_flight = true;
        Ok(Some(id.to_string()))
    }

    /// Apply a finished store call to the cache.
    pub fn complete(&mut self, outcome: MutationOutcome) -> Result<Applied> {
        match outcome {
            MutationOutcome::Created(result) => self.complete_create(result).map(Applied::Created),
            MutationOutcome::Deleted { id, result } => {
                self.complete_delete(&id, result)?;
                Ok(Applied::Deleted { id })
            }
        }
    }

    fn complete_create(&mut self, result: Result<ProfileRecord>) -> Result<ProfileRecord> {
        self.in_flight = false;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "create failed");
                self.notifier
                    .notify(NoticeKind::Error, &format!("Failed to add record: {err}"));
                return Err(err);
            }
        };
        if !self.records.iter().any(|r| r.id == record.id) {
            match self.store.ordering() {
                ListOrder::NewestFirst => self.records.insert(0, record.clone()),
                ListOrder::InsertionOrder => self.records.push(record.clone()),
            }
        }
        self.add_panel_open = false;
        self.notifier
            .notify(NoticeKind::Success, &format!("Added {}", record.full_name));
        Ok(record)
    }

    fn complete_delete(&mut self, id: &str, result: Result<()>) -> Result<()> {
        self.in_flight = false;
        if let Err(err) = result {
            tracing::warn!(id, error = %err, "delete failed");
            self.notifier
                .notify(NoticeKind::Error, &format!("Failed to delete record: {err}"));
            return Err(err);
        }
        let label = self
            .records
            .iter()
            .find(|r| r.id == id)
            .map_or_else(|| id.to_string(), |r| r.full_name.clone());
        self.records.retain(|r| r.id != id);
        if self.selection.as_deref() == Some(id) {
            self.selection = None;
        }
        self.notifier
            .notify(NoticeKind::Success, &format!("Deleted {label}"));
        Ok(())
    }

    /// Validate, create in the store, and cache the new record.
    pub fn on_add_submitted(&mut self, draft: ProfileDraft) -> Result<ProfileRecord> {
        let draft = self.start_add(draft)?;
        let result = self.store.create(draft);
        self.complete_create(result)
    }

    /// Confirm, delete from the store, and drop the record from the cache.
    pub fn on_delete_requested(
        &mut self,
        id: &str,
        confirm: &mut impl Confirm,
    ) -> Result<DeleteOutcome> {
        let Some(id) = self.start_delete(id, confirm)? else {
            return Ok(DeleteOutcome::Cancelled);
        };
        let result = self.store.delete(&id);
        self.complete_delete(&id, result)?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Records matching the current query, in cache order.
    #[must_use]
    pub fn visible(&self) -> Vec<&ProfileRecord> {
        search::filter(&self.records, &self.query)
    }

    #[must_use]
    pub fn records(&self) -> &[ProfileRecord] {
        &self.records
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn selection(&self) -> Option<&ProfileRecord> {
        let id = self.selection.as_deref()?;
        self.records.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn is_add_panel_open(&self) -> bool {
        self.add_panel_open
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreBackend;
    use crate::VaultError;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store with switchable failures and call counting.
    struct FakeStore {
        records: Mutex<Vec<ProfileRecord>>,
        order: ListOrder,
        fail: AtomicBool,
        calls: AtomicUsize,
        next_id: AtomicUsize,
    }

    impl FakeStore {
        fn new(order: ListOrder, records: Vec<ProfileRecord>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records),
                order,
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                next_id: AtomicUsize::new(100),
            })
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(VaultError::unavailable("fake outage"));
            }
            Ok(())
        }
    }

    impl RecordStore for FakeStore {
        fn list_all(&self) -> Result<Vec<ProfileRecord>> {
            self.check()?;
            Ok(self.records.lock().expect("fake list").clone())
        }

        fn create(&self, draft: ProfileDraft) -> Result<ProfileRecord> {
            self.check()?;
            draft.validate()?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            let record = ProfileRecord::from_draft(draft, id, Utc::now());
            let mut records = self.records.lock().expect("fake create");
            match self.order {
                ListOrder::NewestFirst => records.insert(0, record.clone()),
                ListOrder::InsertionOrder => records.push(record.clone()),
            }
            Ok(record)
        }

        fn delete(&self, id: &str) -> Result<()> {
            self.check()?;
            let mut records = self.records.lock().expect("fake delete");
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(VaultError::not_found(id));
            }
            Ok(())
        }

        fn ordering(&self) -> ListOrder {
            self.order
        }

        fn backend(&self) -> StoreBackend {
            StoreBackend::Local
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Vec<(NoticeKind, String)>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, kind: NoticeKind, message: &str) {
            self.notices.push((kind, message.to_string()));
        }
    }

    fn seeded(id: &str, name: &str, email: &str, phone: &str) -> ProfileRecord {
        let created_at = Utc
            .timestamp_millis_opt(1_700_000_000_000)
            .single()
            .expect("timestamp");
        ProfileRecord::from_draft(ProfileDraft::new(name, email, phone), id.to_string(), created_at)
    }

    fn alice_bob() -> Vec<ProfileRecord> {
        vec![
            seeded("1", "Alice Smith", "a@x.com", "111"),
            seeded("2", "Bob Jones", "b@x.com", "222"),
        ]
    }

    fn started(
        order: ListOrder,
    ) -> (Arc<FakeStore>, DirectoryController<RecordingNotifier>) {
        let store = FakeStore::new(order, alice_bob());
        let mut controller = DirectoryController::new(store.clone(), RecordingNotifier::default());
        controller.on_start().expect("start");
        (store, controller)
    }

    fn yes(_: &ProfileRecord) -> bool {
        true
    }

    fn no(_: &ProfileRecord) -> bool {
        false
    }

    #[test]
    fn start_loads_records() {
        let (_, controller) = started(ListOrder::InsertionOrder);
        assert_eq!(controller.records().len(), 2);
        assert_eq!(controller.visible().len(), 2);
        assert!(controller.selection().is_none());
        assert!(!controller.is_add_panel_open());
    }

    #[test]
    fn start_failure_leaves_records_empty_and_notifies() {
        let store = FakeStore::new(ListOrder::InsertionOrder, alice_bob());
        store.set_failing(true);
        let mut controller = DirectoryController::new(store, RecordingNotifier::default());
        let err = controller.on_start().expect_err("outage");
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert!(controller.records().is_empty());
        assert_eq!(controller.notifier().notices[0].0, NoticeKind::Error);
    }

    #[test]
    fn query_change_filters_without_store_calls() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        let calls = store.calls();
        controller.on_query_change("alice");
        let names: Vec<&str> = controller
            .visible()
            .iter()
            .map(|r| r.full_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice Smith"]);
        assert_eq!(controller.query(), "alice");
        assert_eq!(store.calls(), calls);
    }

    #[test]
    fn blank_name_submission_fails_fast_and_keeps_panel_open() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_add_requested();
        let calls = store.calls();
        let err = controller
            .on_add_submitted(ProfileDraft::new("", "x@y.com", "1"))
            .expect_err("blank name");
        assert!(matches!(err, VaultError::Validation { field: "fullName", .. }));
        assert_eq!(controller.records().len(), 2);
        assert!(controller.is_add_panel_open());
        assert_eq!(store.calls(), calls, "store must not be called");
        assert!(!controller.is_busy());
    }

    #[test]
    fn add_appends_for_insertion_order_and_closes_panel() {
        let (_, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("1");
        controller.on_add_requested();
        let created = controller
            .on_add_submitted(ProfileDraft::new("Carol Diaz", "c@x.com", "333"))
            .expect("add");
        assert_eq!(controller.records().last(), Some(&created));
        assert!(!controller.is_add_panel_open());
        assert_eq!(controller.selection().map(|r| r.id.as_str()), Some("1"));
        let last = controller.notifier().notices.last().expect("notice");
        assert_eq!(last.0, NoticeKind::Success);
        assert!(last.1.contains("Carol Diaz"));
    }

    #[test]
    fn add_prepends_for_newest_first_stores() {
        let (store, mut controller) = started(ListOrder::NewestFirst);
        let created = controller
            .on_add_submitted(ProfileDraft::new("Carol Diaz", "c@x.com", "333"))
            .expect("add");
        assert_eq!(controller.records().first(), Some(&created));
        assert_eq!(controller.records(), store.list_all().expect("list").as_slice());
    }

    #[test]
    fn add_failure_keeps_state_and_panel_open() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_add_requested();
        store.set_failing(true);
        let err = controller
            .on_add_submitted(ProfileDraft::new("Carol Diaz", "c@x.com", "333"))
            .expect_err("outage");
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert_eq!(controller.records().len(), 2);
        assert!(controller.is_add_panel_open());
        assert!(!controller.is_busy());
        assert_eq!(
            controller.notifier().notices.last().map(|n| n.0),
            Some(NoticeKind::Error)
        );
    }

    #[test]
    fn delete_removes_record_and_clears_matching_selection() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("2");
        let outcome = controller.on_delete_requested("2", &mut yes).expect("delete");
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(controller.selection().is_none());
        assert_eq!(controller.records().len(), 1);
        assert!(store.list_all().expect("list").iter().all(|r| r.id != "2"));
    }

    #[test]
    fn delete_keeps_unrelated_selection() {
        let (_, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("1");
        controller.on_delete_requested("2", &mut yes).expect("delete");
        assert_eq!(controller.selection().map(|r| r.id.as_str()), Some("1"));
    }

    #[test]
    fn declined_prompt_cancels_without_store_call() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        let calls = store.calls();
        let outcome = controller.on_delete_requested("1", &mut no).expect("cancel");
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(controller.records().len(), 2);
        assert_eq!(store.calls(), calls);
    }

    #[test]
    fn prompt_sees_the_record_being_deleted() {
        let (_, mut controller) = started(ListOrder::InsertionOrder);
        let mut seen = Vec::new();
        let mut prompt = |record: &ProfileRecord| {
            seen.push(format!("Delete target: {}?", record.full_name));
            false
        };
        controller
            .on_delete_requested("1", &mut prompt)
            .expect("cancel");
        assert_eq!(seen, vec!["Delete target: Alice Smith?"]);
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        let calls = store.calls();
        let err = controller
            .on_delete_requested("404", &mut yes)
            .expect_err("unknown");
        assert_eq!(err, VaultError::not_found("404"));
        assert_eq!(store.calls(), calls);
    }

    #[test]
    fn delete_failure_leaves_state_unchanged() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("1");
        store.set_failing(true);
        let err = controller
            .on_delete_requested("1", &mut yes)
            .expect_err("outage");
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert_eq!(controller.records().len(), 2);
        assert_eq!(controller.selection().map(|r| r.id.as_str()), Some("1"));
    }

    #[test]
    fn store_side_not_found_surfaces_and_keeps_cache() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        // Another client removed the row after we loaded.
        store.delete("1").expect("external delete");
        let err = controller
            .on_delete_requested("1", &mut yes)
            .expect_err("gone");
        assert_eq!(err, VaultError::not_found("1"));
        assert_eq!(controller.records().len(), 2);
    }

    #[test]
    fn in_flight_mutation_refuses_second_submission() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        let pending = controller
            .begin_add(ProfileDraft::new("Carol Diaz", "c@x.com", "333"))
            .expect("begin");
        assert!(controller.is_busy());
        assert_eq!(
            controller.begin_add(ProfileDraft::new("Carol Diaz", "c@x.com", "333")),
            Err(VaultError::Busy)
        );
        assert_eq!(
            controller.begin_delete("1", &mut yes),
            Err(VaultError::Busy)
        );
        assert_eq!(controller.on_refresh(), Err(VaultError::Busy));

        let outcome = pending.execute(store.as_ref());
        controller.complete(outcome).expect("complete");
        assert!(!controller.is_busy());
        assert_eq!(controller.records().len(), 3);
    }

    #[test]
    fn select_unknown_id_is_a_no_op() {
        let (_, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("1");
        controller.on_select("missing");
        assert_eq!(controller.selection().map(|r| r.id.as_str()), Some("1"));
        controller.on_deselect();
        assert!(controller.selection().is_none());
    }

    #[test]
    fn panel_toggles() {
        let (_, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_add_requested();
        assert!(controller.is_add_panel_open());
        controller.on_add_panel_closed();
        assert!(!controller.is_add_panel_open());
    }

    #[test]
    fn refresh_drops_selection_of_vanished_record() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        controller.on_select("2");
        store.delete("2").expect("external delete");
        controller.on_refresh().expect("refresh");
        assert!(controller.selection().is_none());
        assert_eq!(controller.records().len(), 1);
    }

    #[test]
    fn refresh_failure_keeps_current_records() {
        let (store, mut controller) = started(ListOrder::InsertionOrder);
        store.set_failing(true);
        assert!(controller.on_refresh().is_err());
        assert_eq!(controller.records().len(), 2);
    }

    #[test]
    fn unreadable_local_slot_is_reported_on_start_not_fatal() {
        let dir = std::env::temp_dir().join(format!(
            "cybervault-controller-bad-slot-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or(0)
        ));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let slot = dir.join("cybervault_users.json");
        std::fs::write(
            &slot,
            r#"[{"id":"1","fullName":"Ok","email":"o@x.com","phoneNumber":"1",
                "createdAt":"2023-11-14T22:13:20.000Z"},
               {"id":"2","fullName":"Bad","email":"b@x.com","phoneNumber":"2","age":-1,
                "createdAt":"2023-11-14T22:13:21.000Z"}]"#,
        )
        .expect("seed");

        let store: Arc<dyn RecordStore> = Arc::new(crate::store::LocalStore::open(&dir));
        let mut controller = DirectoryController::new(store, RecordingNotifier::default());

        let err = controller.on_start().expect_err("load fails");
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert!(controller.records().is_empty());
        assert!(!controller.is_busy());
        let notices = &controller.notifier().notices;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, NoticeKind::Error);
        assert!(notices[0].1.starts_with("Failed to load records"));

        let err = controller
            .on_add_submitted(ProfileDraft::new("Carol", "c@x.com", "333"))
            .expect_err("slot is not overwritten");
        assert!(matches!(err, VaultError::StoreUnavailable(_)));
        assert!(std::fs::read_to_string(&slot)
            .expect("slot")
            .contains("\"age\":-1"));
        let _ = std::fs::remove_dir_all(dir);
    }
}

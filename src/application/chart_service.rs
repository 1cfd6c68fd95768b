// Chart service - tag registry, per-session chart state and upstream round trips
use crate::application::annotation_capture::PointerEvent;
use crate::application::chart_repository::ChartRepository;
use crate::application::chart_session::{ChartSession, ChartView, FetchOutcome, FetchTicket};
use crate::application::export::export_csv;
use crate::application::time_window::TimeWindow;
use crate::application::viewport::ZoomCommand;
use crate::domain::annotation::{Annotation, AnnotationDetails, AnnotationDraft};
use crate::domain::chart::ChartGeometry;
use crate::domain::error::ChartError;
use crate::domain::rule::{detect_violations, Violation};
use crate::domain::tag::{Tag, TagRegistry};
use crate::infrastructure::config::Preferences;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error("backend request failed: {0:#}")]
    Backend(anyhow::Error),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

struct SessionEntry {
    session: ChartSession,
    last_used: Instant,
}

impl SessionEntry {
    fn touch(&mut self) -> &mut ChartSession {
        self.last_used = Instant::now();
        &mut self.session
    }
}

#[derive(Clone)]
pub struct ChartService {
    repository: Arc<dyn ChartRepository>,
    registry: Arc<RwLock<TagRegistry>>,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    preferences: Arc<RwLock<Preferences>>,
    preferences_path: PathBuf,
    geometry: ChartGeometry,
}

impl ChartService {
    pub fn new(
        repository: Arc<dyn ChartRepository>,
        geometry: ChartGeometry,
        preferences: Preferences,
        preferences_path: PathBuf,
    ) -> Self {
        Self {
            repository,
            registry: Arc::new(RwLock::new(TagRegistry::default())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            preferences: Arc::new(RwLock::new(preferences)),
            preferences_path,
            geometry,
        }
    }

    /// Replace the registry with a fresh fetch. On failure the registry is left empty.
    pub async fn refresh_tags(&self) -> Result<usize, ServiceError> {
        let fetched = self.repository.list_tags().await;
        let mut registry = self.registry.write().await;
        match fetched {
            Ok(tags) => {
                *registry = TagRegistry::from_tags(tags);
                tracing::info!("Loaded {} tags", registry.len());
                Ok(registry.len())
            }
            Err(e) => {
                tracing::error!("Failed to fetch tags: {:#}", e);
                *registry = TagRegistry::default();
                Err(ServiceError::Backend(e))
            }
        }
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.registry.read().await.tags().to_vec()
    }

    async fn fresh_session(&self) -> ChartSession {
        let prefs = self.preferences.read().await;
        ChartSession::new(prefs.selected_tags.clone(), prefs.time_window)
    }

    /// Run `f` on the session, creating it from the preferences on first use
    async fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&mut ChartSession) -> T) -> T {
        let mut sessions = self.sessions.lock().await;
        let entry = match sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!("Creating chart session {}", session_id);
                entry.insert(SessionEntry {
                    session: self.fresh_session().await,
                    last_used: Instant::now(),
                })
            }
        };
        f(entry.touch())
    }

    /// Run `f` on the session if it exists
    async fn with_existing_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut ChartSession) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(session_id).map(|entry| f(entry.touch()))
    }

    /// Read the session, or what a new one would look like, without creating it
    async fn read_session<T>(&self, session_id: &str, f: impl FnOnce(&ChartSession) -> T) -> T {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(entry) => f(entry.touch()),
            None => f(&self.fresh_session().await),
        }
    }

    /// Drop a session and everything it holds
    pub async fn close_session(&self, session_id: &str) -> Result<(), ServiceError> {
        match self.sessions.lock().await.remove(session_id) {
            Some(_) => {
                tracing::debug!("Closed chart session {}", session_id);
                Ok(())
            }
            None => Err(ChartError::UnknownSession(session_id.to_string()).into()),
        }
    }

    /// Drop sessions unused for at least `max_idle`; returns how many were dropped
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_used.elapsed() < max_idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!("Evicted {} idle chart sessions", evicted);
        }
        evicted
    }

    pub async fn chart_view(&self, session_id: &str) -> ChartView {
        let registry = self.registry.read().await;
        let geometry = self.geometry;
        self.read_session(session_id, |s| s.view(&registry, &geometry))
            .await
    }

    /// Change the selection and load its samples. The session lock is not held while
    /// the backend is queried; a newer selection made meanwhile wins.
    pub async fn select(
        &self,
        session_id: &str,
        tag_ids: Vec<String>,
        window: Option<TimeWindow>,
    ) -> ChartView {
        let ticket = self
            .with_session(session_id, |s| s.select(tag_ids, window))
            .await;
        if let Some(ticket) = ticket {
            self.load(session_id, ticket).await;
        }
        self.chart_view(session_id).await
    }

    /// Refetch the session's current selection
    pub async fn reload(&self, session_id: &str) -> ChartView {
        let ticket = self.with_session(session_id, |s| s.reload()).await;
        if let Some(ticket) = ticket {
            self.load(session_id, ticket).await;
        }
        self.chart_view(session_id).await
    }

    async fn load(&self, session_id: &str, ticket: FetchTicket) {
        let result = self
            .repository
            .fetch_samples(&ticket.tag_ids, Some(ticket.limit))
            .await;
        if let Err(e) = &result {
            tracing::error!("Failed to fetch samples for session {}: {:#}", session_id, e);
        }

        let outcome = self
            .with_existing_session(session_id, |s| s.apply_fetch(&ticket, result))
            .await
            .unwrap_or(FetchOutcome::Stale);
        match outcome {
            FetchOutcome::Applied { samples } => tracing::debug!(
                "Session {} generation {} loaded {} samples",
                session_id,
                ticket.generation,
                samples
            ),
            FetchOutcome::Stale => tracing::info!(
                "Discarding stale fetch for session {} (generation {})",
                session_id,
                ticket.generation
            ),
            FetchOutcome::Failed => {}
        }
    }

    pub async fn zoom(&self, session_id: &str, command: ZoomCommand) -> ChartView {
        let registry = self.registry.read().await;
        let geometry = self.geometry;
        self.with_session(session_id, |s| {
            s.zoom(command, &registry, &geometry);
            s.view(&registry, &geometry)
        })
        .await
    }

    pub async fn pointer(&self, session_id: &str, event: PointerEvent) -> Option<AnnotationDraft> {
        let registry = self.registry.read().await;
        let geometry = self.geometry;
        self.with_session(session_id, |s| s.pointer(event, &registry, &geometry))
            .await
    }

    /// Commit the pending draft with the user's details. The draft stays pending if
    /// validation or the backend write fails.
    pub async fn confirm_annotation(
        &self,
        session_id: &str,
        details: AnnotationDetails,
    ) -> Result<Annotation, ServiceError> {
        let details = details.validated()?;
        let draft = self
            .with_existing_session(session_id, |s| s.pending().cloned())
            .await
            .flatten()
            .ok_or(ChartError::NoPendingDraft)?;

        let annotation = self
            .repository
            .commit_annotation(&draft, &details)
            .await
            .map_err(|e| {
                tracing::error!("Failed to commit annotation: {:#}", e);
                ServiceError::Backend(e)
            })?;

        self.with_existing_session(session_id, |s| {
            s.clear_pending_if(&draft);
            s.record_annotation(annotation.clone());
        })
        .await;
        tracing::info!(
            "Committed {} annotation {} on {}",
            draft.kind(),
            annotation.id,
            draft.tag_id()
        );
        Ok(annotation)
    }

    pub async fn cancel_annotation(&self, session_id: &str) -> Result<(), ServiceError> {
        self.with_existing_session(session_id, |s| s.cancel_pending())
            .await
            .unwrap_or(Err(ChartError::NoPendingDraft))?;
        Ok(())
    }

    pub async fn export_csv(&self, session_id: &str) -> String {
        let registry = self.registry.read().await;
        self.read_session(session_id, |s| {
            export_csv(&s.visible_rows(&registry), s.selected_tags(), &registry)
        })
        .await
    }

    /// Rule violations over the visible rows of every selected tag.
    /// Rules that cannot be fetched are treated as none.
    pub async fn violations(&self, session_id: &str) -> Vec<Violation> {
        let rules = self.repository.list_rules().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to fetch rules: {:#}", e);
            Vec::new()
        });

        let registry = self.registry.read().await;
        self.read_session(session_id, |s| {
            let rows = s.visible_rows(&registry);
            s.selected_tags()
                .iter()
                .flat_map(|tag_id| detect_violations(&rows, &rules, tag_id))
                .collect()
        })
        .await
    }

    pub async fn preferences(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    /// Persist preferences; sessions created afterwards start from them
    pub async fn save_preferences(&self, preferences: Preferences) -> Result<(), ServiceError> {
        preferences
            .save(&self.preferences_path)
            .map_err(ServiceError::Internal)?;
        *self.preferences.write().await = preferences;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::annotation::{Category, Severity};
    use crate::domain::rule::{Rule, RuleCondition};
    use crate::domain::telemetry::Sample;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-memory backend; sample fetches for a tag listed in `gated` wait for `gate`
    #[derive(Default)]
    struct FakeRepository {
        tags: Vec<Tag>,
        samples: Vec<Sample>,
        rules: Vec<Rule>,
        fail_samples: bool,
        gated: Option<String>,
        gate: Notify,
        committed: std::sync::Mutex<Vec<AnnotationDraft>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ChartRepository for FakeRepository {
        async fn list_tags(&self) -> anyhow::Result<Vec<Tag>> {
            Ok(self.tags.clone())
        }

        async fn fetch_samples(
            &self,
            tag_ids: &[String],
            limit: Option<usize>,
        ) -> anyhow::Result<Vec<Sample>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.gated.as_ref().is_some_and(|g| tag_ids.contains(g)) {
                self.gate.notified().await;
            }
            if self.fail_samples {
                anyhow::bail!("backend unavailable");
            }
            let mut out: Vec<Sample> = self
                .samples
                .iter()
                .filter(|s| tag_ids.contains(&s.tag_id))
                .cloned()
                .collect();
            if let Some(limit) = limit {
                out.truncate(limit);
            }
            Ok(out)
        }

        async fn commit_annotation(
            &self,
            draft: &AnnotationDraft,
            details: &AnnotationDetails,
        ) -> anyhow::Result<Annotation> {
            let mut committed = self.committed.lock().unwrap();
            committed.push(draft.clone());
            Ok(Annotation {
                id: committed.len() as i64,
                draft: draft.clone(),
                details: details.clone(),
            })
        }

        async fn list_rules(&self) -> anyhow::Result<Vec<Rule>> {
            Ok(self.rules.clone())
        }
    }

    fn repository() -> FakeRepository {
        FakeRepository {
            tags: vec![
                Tag::new("T1", "Flow", "m3/h", 0.0, 100.0, None),
                Tag::new("T2", "Pressure", "bar", 0.0, 10.0, None),
            ],
            samples: (0..10)
                .flat_map(|i| {
                    [
                        Sample::new(i * 1000, "T1", i as f64 * 10.0),
                        Sample::new(i * 1000, "T2", 5.0),
                    ]
                })
                .collect(),
            ..Default::default()
        }
    }

    async fn service(repo: FakeRepository) -> (ChartService, Arc<FakeRepository>) {
        let repo = Arc::new(repo);
        let service = ChartService::new(
            repo.clone(),
            ChartGeometry::plot(900.0, 100.0),
            Preferences::default(),
            std::env::temp_dir().join(format!("chart-annotator-svc-{}.toml", std::process::id())),
        );
        service.refresh_tags().await.unwrap();
        (service, repo)
    }

    fn tags(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_select_loads_normalized_rows() {
        let (service, _) = service(repository()).await;
        let view = service.select("s1", tags(&["T1", "T2"]), None).await;

        assert_eq!(view.rows.len(), 10);
        assert_eq!(view.rows[3].value("T1"), Some(30.0));
        assert_eq!(view.rows[3].value("T2"), Some(50.0));
        assert!(!view.loading);
        assert_eq!(view.legend.len(), 2);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (service, _) = service(repository()).await;
        service.select("a", tags(&["T1"]), None).await;

        assert!(service.chart_view("b").await.rows.is_empty());
        assert_eq!(service.chart_view("a").await.rows.len(), 10);
    }

    #[tokio::test]
    async fn test_reads_do_not_create_sessions() {
        let (service, _) = service(repository()).await;
        service
            .save_preferences(Preferences {
                selected_tags: tags(&["T1"]),
                ..Preferences::default()
            })
            .await
            .unwrap();

        let view = service.chart_view("ghost").await;
        assert_eq!(view.selected_tags, tags(&["T1"]));
        assert!(view.rows.is_empty());
        assert_eq!(service.export_csv("ghost").await, "");
        assert!(service.violations("ghost").await.is_empty());
        assert!(matches!(
            service.cancel_annotation("ghost").await,
            Err(ServiceError::Chart(ChartError::NoPendingDraft))
        ));
        assert!(service.sessions.lock().await.is_empty());

        let _ = std::fs::remove_file(&service.preferences_path);
    }

    #[tokio::test]
    async fn test_sessions_can_be_closed_and_evicted() {
        let (service, _) = service(repository()).await;
        service.select("a", tags(&["T1"]), None).await;
        service.select("b", tags(&["T2"]), None).await;

        service.close_session("a").await.unwrap();
        assert!(matches!(
            service.close_session("a").await,
            Err(ServiceError::Chart(ChartError::UnknownSession(_)))
        ));

        assert_eq!(service.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(service.chart_view("b").await.rows.len(), 10);
        assert_eq!(service.evict_idle(Duration::ZERO).await, 1);
        assert!(service.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_fetch_does_not_overwrite_newer_selection() {
        let repo = FakeRepository {
            gated: Some("T1".to_string()),
            ..repository()
        };
        let (service, repo) = service(repo).await;

        let slow = {
            let service = service.clone();
            tokio::spawn(async move { service.select("s", tags(&["T1"]), None).await })
        };
        while repo.fetches.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fast = service.select("s", tags(&["T2"]), None).await;
        assert_eq!(fast.selected_tags, tags(&["T2"]));
        assert_eq!(fast.rows.len(), 10);

        repo.gate.notify_one();
        slow.await.unwrap();

        let view = service.chart_view("s").await;
        assert_eq!(view.selected_tags, tags(&["T2"]));
        assert!(view.rows.iter().all(|r| r.value("T1").is_none()));
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_notice() {
        let repo = FakeRepository {
            fail_samples: true,
            ..repository()
        };
        let (service, _) = service(repo).await;
        let view = service.select("s", tags(&["T1"]), None).await;

        assert!(view.rows.is_empty());
        assert!(view.notice.is_some());
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_point_annotation_round_trip() {
        let (service, repo) = service(repository()).await;
        service.select("s", tags(&["T1"]), None).await;

        // Data spans [0, 9000] over 900px: x=300 -> t=3000, T1=30 -> y=70
        service
            .pointer("s", PointerEvent::Down { x: 300.0, y: 70.0 })
            .await;
        let draft = service
            .pointer("s", PointerEvent::Up { x: 300.0, y: 70.0 })
            .await
            .unwrap();
        assert!(matches!(draft, AnnotationDraft::Point { timestamp_ms: 3000, .. }));

        let blank = AnnotationDetails {
            description: "   ".to_string(),
            category: Category::Good,
            severity: Severity::Low,
        };
        assert!(matches!(
            service.confirm_annotation("s", blank).await,
            Err(ServiceError::Chart(ChartError::EmptyDescription))
        ));
        assert!(service.chart_view("s").await.pending_draft.is_some());

        let details = AnnotationDetails {
            description: "valve opened".to_string(),
            category: Category::Good,
            severity: Severity::Low,
        };
        let stored = service.confirm_annotation("s", details).await.unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(repo.committed.lock().unwrap().as_slice(), &[draft]);
        let view = service.chart_view("s").await;
        assert!(view.pending_draft.is_none());
        assert_eq!(view.annotations.len(), 1);
        assert_eq!(view.annotations[0].id, 1);
        assert_eq!(view.annotations[0].x_start, 300.0);

        assert!(matches!(
            service.cancel_annotation("s").await,
            Err(ServiceError::Chart(ChartError::NoPendingDraft))
        ));
    }

    #[tokio::test]
    async fn test_zoom_and_export_use_visible_rows() {
        let (service, _) = service(repository()).await;
        service.select("s", tags(&["T1"]), None).await;

        let view = service.zoom("s", ZoomCommand::In).await;
        let stamps: Vec<i64> = view.rows.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![3000, 4000, 5000, 6000]);

        let csv = service.export_csv("s").await;
        assert_eq!(csv.lines().count(), 5);
        assert!(csv.starts_with("Timestamp,T1: Flow (m3/h)\n"));
    }

    #[tokio::test]
    async fn test_violations_over_selected_tags() {
        let repo = FakeRepository {
            rules: vec![Rule {
                id: 1,
                tag_id: "T1".to_string(),
                condition: RuleCondition::GreaterThan,
                threshold: 70.0,
                threshold_max: None,
                severity: Severity::High,
                is_active: true,
            }],
            ..repository()
        };
        let (service, _) = service(repo).await;
        service.select("s", tags(&["T1", "T2"]), None).await;

        let violations = service.violations("s").await;
        let stamps: Vec<i64> = violations.iter().map(|v| v.timestamp_ms).collect();
        assert_eq!(stamps, vec![8000, 9000]);
    }

    #[tokio::test]
    async fn test_saved_preferences_seed_new_sessions() {
        let (service, _) = service(repository()).await;
        let prefs = Preferences {
            industry: Some("Chemicals".to_string()),
            selected_tags: tags(&["T2"]),
            time_window: TimeWindow::Points(5),
        };
        service.save_preferences(prefs.clone()).await.unwrap();
        assert_eq!(service.preferences().await, prefs);

        let view = service.reload("fresh").await;
        assert_eq!(view.selected_tags, tags(&["T2"]));
        assert_eq!(view.rows.len(), 5);

        let _ = std::fs::remove_file(&service.preferences_path);
    }
}

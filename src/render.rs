use serde_json::Value;
use thiserror::Error;

use crate::blocks::ContentBlock;
use crate::markdown::MarkdownPipeline;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("no container `{container}` in the document")]
    MissingContainer { container: String },
    #[error("chart in `{container}` failed to configure: {message}")]
    Configure { container: String, message: String },
}

/// A live chart bound to one container. Disposal must be idempotent; the
/// dispatcher may call it on any exit path.
pub trait ChartHandle {
    fn configure(&mut self, spec: &Value) -> Result<(), RenderError>;
    fn resize(&self);
    fn dispose(&mut self);
}

/// Creates chart handles bound to view-owned containers, addressed by
/// element id. Acquiring a container that already has a live instance must
/// dispose the stale one first.
pub trait ChartBackend {
    type Handle: ChartHandle;

    fn acquire(&self, container: &str) -> Result<Self::Handle, RenderError>;
}

/// Phase-one output: what the view must lay out for each block, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockView {
    Html { html: String },
    Chart { container: String },
    Unknown { kind: String },
}

pub fn unknown_marker(kind: &str) -> String {
    format!("unknown content type: {kind}")
}

/// Maps parsed blocks onto renderers and owns every live chart handle.
///
/// Rendering is two-phase: `begin_pass` disposes the previous pass and
/// describes the containers the view must create; `mount_charts` runs once
/// those containers exist and binds exactly one handle per chart block.
pub struct Dispatcher<B: ChartBackend> {
    backend: B,
    container_prefix: String,
    handles: Vec<B::Handle>,
}

impl<B: ChartBackend> Dispatcher<B> {
    pub fn new(backend: B, container_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            container_prefix: container_prefix.into(),
            handles: Vec::new(),
        }
    }

    pub fn container_id(&self, index: usize) -> String {
        format!("{}-block-{index}", self.container_prefix)
    }

    pub fn begin_pass(
        &mut self,
        blocks: &[ContentBlock],
        markdown: &MarkdownPipeline,
    ) -> Vec<BlockView> {
        // Previous pass handles go first; no two live handles may ever
        // share a container.
        self.teardown();
        blocks
            .iter()
            .enumerate()
            .map(|(index, block)| match block {
                ContentBlock::Markdown { text } => BlockView::Html {
                    html: markdown.render(text),
                },
                ContentBlock::Chart { .. } => BlockView::Chart {
                    container: self.container_id(index),
                },
                ContentBlock::Unknown { kind, .. } => BlockView::Unknown { kind: kind.clone() },
            })
            .collect()
    }

    /// Bind a handle to every chart block's container. A failing block is
    /// reported and skipped; its siblings still mount.
    pub fn mount_charts(&mut self, blocks: &[ContentBlock]) -> Vec<RenderError> {
        let mut failures = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let ContentBlock::Chart { spec } = block else {
                continue;
            };
            let container = self.container_id(index);
            match self.backend.acquire(&container) {
                Ok(mut handle) => {
                    if let Err(err) = handle.configure(spec) {
                        failures.push(err);
                    }
                    // Keep the handle either way; it is bound to the
                    // container and must be disposed with the pass.
                    self.handles.push(handle);
                }
                Err(err) => failures.push(err),
            }
        }
        failures
    }

    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn resize_charts(&self) {
        for handle in &self.handles {
            handle.resize();
        }
    }

    /// Dispose every live handle. Runs on re-render, document switch and
    /// component cleanup.
    pub fn teardown(&mut self) {
        for mut handle in self.handles.drain(..) {
            handle.dispose();
        }
    }
}

impl<B: ChartBackend> Drop for Dispatcher<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    enum MockEvent {
        Acquired(String),
        Configured(String, Value),
        Disposed(String),
    }

    #[derive(Default)]
    struct MockState {
        events: Vec<MockEvent>,
        live: HashSet<String>,
        fail_configure: HashSet<String>,
        fail_acquire: HashSet<String>,
    }

    #[derive(Clone, Default)]
    struct MockBackend {
        state: Rc<RefCell<MockState>>,
    }

    struct MockHandle {
        state: Rc<RefCell<MockState>>,
        container: String,
        disposed: bool,
    }

    impl ChartBackend for MockBackend {
        type Handle = MockHandle;

        fn acquire(&self, container: &str) -> Result<MockHandle, RenderError> {
            let mut state = self.state.borrow_mut();
            if state.fail_acquire.contains(container) {
                return Err(RenderError::MissingContainer {
                    container: container.to_string(),
                });
            }
            if state.live.contains(container) {
                state.events.push(MockEvent::Disposed(container.to_string()));
            }
            state.live.insert(container.to_string());
            state.events.push(MockEvent::Acquired(container.to_string()));
            Ok(MockHandle {
                state: Rc::clone(&self.state),
                container: container.to_string(),
                disposed: false,
            })
        }
    }

    impl ChartHandle for MockHandle {
        fn configure(&mut self, spec: &Value) -> Result<(), RenderError> {
            let mut state = self.state.borrow_mut();
            if state.fail_configure.contains(&self.container) {
                return Err(RenderError::Configure {
                    container: self.container.clone(),
                    message: "backend refused".to_string(),
                });
            }
            state
                .events
                .push(MockEvent::Configured(self.container.clone(), spec.clone()));
            Ok(())
        }

        fn resize(&self) {}

        fn dispose(&mut self) {
            if self.disposed {
                return;
            }
            self.disposed = true;
            let mut state = self.state.borrow_mut();
            state.live.remove(&self.container);
            state.events.push(MockEvent::Disposed(self.container.clone()));
        }
    }

    fn dispatcher(backend: &MockBackend) -> Dispatcher<MockBackend> {
        Dispatcher::new(backend.clone(), "mb")
    }

    fn run_pass(
        dispatcher: &mut Dispatcher<MockBackend>,
        raw: &str,
    ) -> (Vec<ContentBlock>, Vec<BlockView>, Vec<RenderError>) {
        let parsed = blocks::parse(raw).unwrap();
        let views = dispatcher.begin_pass(&parsed, &MarkdownPipeline::default());
        let failures = dispatcher.mount_charts(&parsed);
        (parsed, views, failures)
    }

    #[test]
    fn markdown_block_renders_html_and_no_handles() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        let (_, views, failures) =
            run_pass(&mut dispatcher, r##"[{"kind":"markdown","data":{"text":"# Hi"}}]"##);
        assert!(failures.is_empty());
        assert_eq!(views.len(), 1);
        let BlockView::Html { html } = &views[0] else {
            panic!("expected html view");
        };
        assert!(html.contains("<h1>Hi</h1>"));
        assert_eq!(dispatcher.live_handles(), 0);
    }

    #[test]
    fn chart_block_mounts_one_configured_handle() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        let (_, views, failures) =
            run_pass(&mut dispatcher, r#"[{"kind":"chart","data":{"series":[]}}]"#);
        assert!(failures.is_empty());
        assert_eq!(
            views[0],
            BlockView::Chart {
                container: "mb-block-0".to_string()
            }
        );
        assert_eq!(dispatcher.live_handles(), 1);
        let state = backend.state.borrow();
        assert_eq!(
            state.events,
            vec![
                MockEvent::Acquired("mb-block-0".to_string()),
                MockEvent::Configured("mb-block-0".to_string(), json!({"series": []})),
            ]
        );
    }

    #[test]
    fn new_pass_disposes_previous_handles_before_acquiring() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        run_pass(&mut dispatcher, r#"[{"kind":"chart","data":{"a":1}}]"#);
        let (_, _, failures) = run_pass(
            &mut dispatcher,
            r#"[{"kind":"chart","data":{"b":2}},{"kind":"chart","data":{"c":3}}]"#,
        );
        assert!(failures.is_empty());
        assert_eq!(dispatcher.live_handles(), 2);

        let state = backend.state.borrow();
        let first_new_acquire = state
            .events
            .iter()
            .enumerate()
            .skip(2)
            .find(|(_, e)| matches!(e, MockEvent::Acquired(_)))
            .map(|(i, _)| i)
            .unwrap();
        let old_dispose = state
            .events
            .iter()
            .position(|e| *e == MockEvent::Disposed("mb-block-0".to_string()))
            .unwrap();
        assert!(old_dispose < first_new_acquire);
        assert_eq!(state.live.len(), 2);
    }

    #[test]
    fn unknown_block_renders_marker_and_does_not_abort_siblings() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        let (_, views, failures) = run_pass(
            &mut dispatcher,
            r#"[
                {"kind":"widget","data":{}},
                {"kind":"chart","data":{"series":[]}}
            ]"#,
        );
        assert!(failures.is_empty());
        assert_eq!(
            views[0],
            BlockView::Unknown {
                kind: "widget".to_string()
            }
        );
        assert_eq!(unknown_marker("widget"), "unknown content type: widget");
        assert_eq!(dispatcher.live_handles(), 1);
    }

    #[test]
    fn configure_failure_is_reported_but_siblings_still_mount() {
        let backend = MockBackend::default();
        backend
            .state
            .borrow_mut()
            .fail_configure
            .insert("mb-block-0".to_string());
        let mut dispatcher = dispatcher(&backend);
        let (_, _, failures) = run_pass(
            &mut dispatcher,
            r#"[{"kind":"chart","data":{"a":1}},{"kind":"chart","data":{"b":2}}]"#,
        );
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], RenderError::Configure { .. }));
        // The failed handle stays bound to its container until teardown.
        assert_eq!(dispatcher.live_handles(), 2);
        assert!(backend
            .state
            .borrow()
            .events
            .contains(&MockEvent::Configured("mb-block-1".to_string(), json!({"b": 2}))));
    }

    #[test]
    fn missing_container_skips_that_block_only() {
        let backend = MockBackend::default();
        backend
            .state
            .borrow_mut()
            .fail_acquire
            .insert("mb-block-0".to_string());
        let mut dispatcher = dispatcher(&backend);
        let (_, _, failures) = run_pass(
            &mut dispatcher,
            r#"[{"kind":"chart","data":{"a":1}},{"kind":"chart","data":{"b":2}}]"#,
        );
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], RenderError::MissingContainer { .. }));
        assert_eq!(dispatcher.live_handles(), 1);
    }

    #[test]
    fn teardown_disposes_everything_and_is_idempotent() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        run_pass(
            &mut dispatcher,
            r#"[{"kind":"chart","data":{"a":1}},{"kind":"chart","data":{"b":2}}]"#,
        );
        assert_eq!(dispatcher.live_handles(), 2);
        dispatcher.teardown();
        dispatcher.teardown();
        assert_eq!(dispatcher.live_handles(), 0);
        assert!(backend.state.borrow().live.is_empty());
    }

    #[test]
    fn drop_disposes_live_handles() {
        let backend = MockBackend::default();
        {
            let mut dispatcher = dispatcher(&backend);
            run_pass(&mut dispatcher, r#"[{"kind":"chart","data":{"a":1}}]"#);
        }
        assert!(backend.state.borrow().live.is_empty());
    }

    #[test]
    fn failed_parse_leaves_previous_pass_live() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        run_pass(&mut dispatcher, r#"[{"kind":"chart","data":{"a":1}}]"#);
        // A parse failure never reaches the dispatcher, so the last good
        // pass keeps its handles and the preview stays up.
        assert!(blocks::parse("not a block list").is_err());
        assert_eq!(dispatcher.live_handles(), 1);
        assert_eq!(backend.state.borrow().live.len(), 1);
    }

    #[test]
    fn handle_count_matches_chart_blocks() {
        let backend = MockBackend::default();
        let mut dispatcher = dispatcher(&backend);
        let (_, _, failures) = run_pass(
            &mut dispatcher,
            r#"[
                {"kind":"markdown","data":{"text":"a"}},
                {"kind":"chart","data":{"a":1}},
                {"kind":"mystery","data":{}},
                {"kind":"chart","data":{"b":2}},
                {"kind":"chart","data":{"c":3}}
            ]"#,
        );
        assert!(failures.is_empty());
        assert_eq!(dispatcher.live_handles(), 3);
        assert_eq!(backend.state.borrow().live.len(), 3);
    }
}

use gloo_timers::callback::{Interval, Timeout};
use leptos::logging;
use leptos::prelude::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::app::{export_document, now_ms, toggle_fullscreen, DocumentSidebar};
use crate::autosave::{AutosaveScheduler, SaveStatus, AUTOSAVE_INTERVAL_MS, STATUS_TTL_MS};
use crate::blocks;
use crate::chart::EchartsBackend;
use crate::markdown::{mark_highlight, MarkdownPipeline};
use crate::render::{unknown_marker, BlockView, Dispatcher};
use crate::store::{
    reserved_name, BrowserStorage, DocumentStore, PayloadFormat, BLOCK_PAD, DEFAULT_DOC_NAME,
};

const STARTER_DOC: &str = r##"[
  { "kind": "markdown", "data": { "text": "# Mixed document\n\nText and charts, interleaved." } },
  { "kind": "chart", "data": { "xAxis": { "type": "category", "data": ["a", "b"] }, "yAxis": { "type": "value" }, "series": [{ "type": "line", "data": [1, 2] }] } }
]"##;

/// Multi-block surface: the raw text is a serialized block list, the
/// preview is one pane per block.
///
/// Rendering is two-phase. A successful parse commits the new block views
/// (phase 1); chart handles are only created on a deferred tick, once the
/// view has laid the containers out (phase 2). A failed parse touches
/// nothing but the diagnostic line, so the preview keeps showing the last
/// good pass while the textarea tracks every keystroke.
#[component]
pub fn BlockEditor() -> impl IntoView {
    let Some(backend) = BrowserStorage::local() else {
        return view! { <p style="padding: 2rem;">"localStorage is unavailable in this browser."</p> }
            .into_any();
    };
    let store = StoredValue::new_local(DocumentStore::new(
        backend,
        BLOCK_PAD,
        PayloadFormat::Timestamped,
    ));
    let dispatcher = StoredValue::new_local(Dispatcher::new(EchartsBackend, "composer"));
    let pipeline = StoredValue::new(MarkdownPipeline::default().with_extension(mark_highlight()));

    let initial_name = store.with_value(|s| s.last_used_name());
    let initial_text = match store.with_value(|s| s.get(&initial_name)) {
        Ok(Some(text)) => text,
        Ok(None) => STARTER_DOC.to_string(),
        Err(err) => {
            logging::warn!("failed to read `{initial_name}`: {err}");
            STARTER_DOC.to_string()
        }
    };

    let (filename, set_filename) = signal(initial_name);
    let (content, set_content) = signal(initial_text);
    let (views, set_views) = signal(Vec::<BlockView>::new());
    let (diagnostic, set_diagnostic) = signal(None::<String>);
    let (entries, set_entries) = signal(store.with_value(|s| s.list(now_ms())));
    let (status, set_status) = signal(None::<SaveStatus>);
    let scheduler = StoredValue::new(AutosaveScheduler::new());
    let status_timer = StoredValue::new_local(None::<Timeout>);
    let autosave_interval = StoredValue::new_local(None::<Interval>);

    let refresh_entries = move || set_entries.set(store.with_value(|s| s.list(now_ms())));

    let persist = move |name: &str, text: &str| {
        if let Err(err) = store.with_value(|s| s.put(name, text, now_ms())) {
            logging::warn!("save failed: {err}");
        }
    };

    let show_saved = move || {
        set_status.set(Some(SaveStatus::saved(now_ms())));
        status_timer.set_value(Some(Timeout::new(STATUS_TTL_MS, move || {
            set_status.set(None)
        })));
    };

    let render_blocks = move || {
        let text = content.get_untracked();
        match blocks::parse(&text) {
            Ok(parsed) => {
                set_diagnostic.set(None);
                let block_views = dispatcher
                    .try_update_value(|d| pipeline.with_value(|p| d.begin_pass(&parsed, p)))
                    .unwrap_or_default();
                // Phase 1: commit the views so the containers get created.
                set_views.set(block_views);
                // Phase 2: bind chart handles once the DOM has them.
                Timeout::new(0, move || {
                    let failures = dispatcher
                        .try_update_value(|d| d.mount_charts(&parsed))
                        .unwrap_or_default();
                    for err in failures {
                        logging::warn!("block render failed: {err}");
                    }
                })
                .forget();
            }
            Err(err) => set_diagnostic.set(Some(err.to_string())),
        }
    };

    let update_content = move |ev| {
        let text = event_target_value(&ev);
        // Write-through: raw text is persisted whether or not it parses.
        persist(&filename.get_untracked(), &text);
        scheduler.update_value(|s| s.note_edit(now_ms()));
        set_content.set(text);
        render_blocks();
    };

    autosave_interval.set_value(Some(Interval::new(AUTOSAVE_INTERVAL_MS, move || {
        if scheduler.with_value(|s| s.should_save(now_ms())) {
            persist(&filename.get_untracked(), &content.get_untracked());
            show_saved();
        }
    })));

    let resize_listener = StoredValue::new_local(None::<Closure<dyn FnMut()>>);
    {
        let resize = Closure::<dyn FnMut()>::new(move || {
            let _ = dispatcher.try_with_value(|d| d.resize_charts());
        });
        let _ = window()
            .add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref());
        resize_listener.set_value(Some(resize));
    }

    on_cleanup(move || {
        // The listener comes off the window before its closure is dropped;
        // leaving it registered would keep firing into a torn-down surface.
        if let Some(resize) = resize_listener.try_update_value(|l| l.take()).flatten() {
            let _ = window()
                .remove_event_listener_with_callback("resize", resize.as_ref().unchecked_ref());
        }
        dispatcher.update_value(|d| d.teardown());
        autosave_interval.set_value(None);
        status_timer.set_value(None);
    });

    let open_document = Callback::new(move |name: String| {
        // Handles never outlive the document they were created for.
        dispatcher.update_value(|d| d.teardown());
        set_views.set(Vec::new());
        let text = match store.with_value(|s| s.get(&name)) {
            Ok(Some(text)) => text,
            Ok(None) => STARTER_DOC.to_string(),
            Err(err) => {
                logging::warn!("failed to read `{name}`: {err}");
                STARTER_DOC.to_string()
            }
        };
        if let Err(err) = store.with_value(|s| s.set_last_used_name(&name)) {
            logging::warn!("could not record active document: {err}");
        }
        set_filename.set(name);
        set_content.set(text);
        render_blocks();
    });

    let create_document = Callback::new(move |_: ()| {
        let Ok(Some(raw)) = window().prompt_with_message("New document name") else {
            return;
        };
        let name = raw.trim().to_string();
        if name.is_empty() || reserved_name(&name) {
            return;
        }
        persist(&name, STARTER_DOC);
        refresh_entries();
        open_document.run(name);
    });

    let delete_document = Callback::new(move |name: String| {
        store.with_value(|s| s.remove(&name));
        refresh_entries();
        if filename.get_untracked() == name {
            let next = store
                .with_value(|s| s.list(now_ms()))
                .into_iter()
                .next()
                .map(|entry| entry.name)
                .unwrap_or_else(|| DEFAULT_DOC_NAME.to_string());
            open_document.run(next);
        }
    });

    let rename = move |ev| {
        let new_name = event_target_value(&ev).trim().to_string();
        let old_name = filename.get_untracked();
        if new_name.is_empty() || new_name == old_name {
            set_filename.set(old_name);
            return;
        }
        if let Err(err) = store.with_value(|s| s.rename(&old_name, &new_name)) {
            logging::warn!("rename failed: {err}");
            set_filename.set(old_name);
            return;
        }
        if let Err(err) = store.with_value(|s| s.set_last_used_name(&new_name)) {
            logging::warn!("could not record active document: {err}");
        }
        persist(&new_name, &content.get_untracked());
        set_filename.set(new_name);
        refresh_entries();
    };

    render_blocks();

    view! {
        <div style="display: flex; flex: 1; min-height: 0;">
            <DocumentSidebar
                entries=entries
                active=filename
                on_select=open_document
                on_new=create_document
                on_delete=delete_document
            />
            <section style="flex: 1; display: flex; flex-direction: column; min-width: 0;">
                <header style="display: flex; align-items: center; gap: 0.75rem; padding: 0.5rem 1rem; border-bottom: 1px solid #e5e7eb;">
                    <input
                        prop:value=move || filename.get()
                        on:change=rename
                        style="font-weight: 600; border: none; outline: none; padding: 0.25rem; min-width: 0;"
                    />
                    <span style="flex: 1; color: #10b981; font-size: 0.85rem;">
                        {move || status.get().map(|s| s.message)}
                    </span>
                    <button on:click=move |_| export_document(
                        &format!("{}.json", filename.get_untracked()),
                        &content.get_untracked(),
                    )>"Export"</button>
                    <button on:click=move |_| toggle_fullscreen()>"Fullscreen"</button>
                </header>
                <div style="display: flex; flex: 1; min-height: 0;">
                    <div style="flex: 1; display: flex; flex-direction: column; min-width: 0;">
                        <textarea
                            prop:value=move || content.get()
                            on:input=update_content
                            placeholder="A JSON list of blocks..."
                            spellcheck="false"
                            style="flex: 1; padding: 1.5rem; border: none; outline: none; resize: none; font-family: ui-monospace, monospace; font-size: 13px; line-height: 1.5;"
                        ></textarea>
                        <div style="color: #dc2626; font-size: 0.85rem; padding: 0 1.5rem 0.5rem; min-height: 1.2rem;">
                            {move || diagnostic.get()}
                        </div>
                    </div>
                    <div style="flex: 1; min-width: 0; overflow-y: auto; border-left: 1px solid #e5e7eb; padding: 1rem;">
                        {move || views.get().into_iter().map(|block| match block {
                            BlockView::Html { html } => view! {
                                <div inner_html=html style="margin-bottom: 1rem;"></div>
                            }
                            .into_any(),
                            BlockView::Chart { container } => view! {
                                <div id=container style="height: 320px; margin-bottom: 1rem;"></div>
                            }
                            .into_any(),
                            BlockView::Unknown { kind } => view! {
                                <div style="margin-bottom: 1rem; padding: 0.75rem; border: 1px dashed #d1d5db; color: #6b7280; font-size: 0.85rem;">
                                    {unknown_marker(&kind)}
                                </div>
                            }
                            .into_any(),
                        }).collect::<Vec<_>>()}
                    </div>
                </div>
            </section>
        </div>
    }
    .into_any()
}

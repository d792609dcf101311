use gloo_timers::callback::{Interval, Timeout};
use leptos::logging;
use leptos::prelude::*;

use crate::app::{export_document, now_ms, toggle_fullscreen, DocumentSidebar};
use crate::autosave::{AutosaveScheduler, SaveStatus, AUTOSAVE_INTERVAL_MS, STATUS_TTL_MS};
use crate::markdown::{mark_highlight, MarkdownPipeline};
use crate::store::{
    reserved_name, BrowserStorage, DocumentStore, PayloadFormat, DEFAULT_DOC_NAME, MARKDOWN_PAD,
};

#[component]
pub fn MarkdownEditor() -> impl IntoView {
    let Some(backend) = BrowserStorage::local() else {
        return view! { <p style="padding: 2rem;">"localStorage is unavailable in this browser."</p> }
            .into_any();
    };
    let store = StoredValue::new_local(DocumentStore::new(
        backend,
        MARKDOWN_PAD,
        PayloadFormat::PlainText,
    ));
    let pipeline = StoredValue::new(MarkdownPipeline::default().with_extension(mark_highlight()));

    let initial_name = store.with_value(|s| s.last_used_name());
    let initial_text = match store.with_value(|s| s.get(&initial_name)) {
        Ok(Some(text)) => text,
        Ok(None) => String::new(),
        Err(err) => {
            logging::warn!("failed to read `{initial_name}`: {err}");
            String::new()
        }
    };

    let (filename, set_filename) = signal(initial_name);
    let (content, set_content) = signal(initial_text.clone());
    let (preview, set_preview) = signal(pipeline.with_value(|p| p.render(&initial_text)));
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
        // Replacing the pending timeout cancels it, so only the newest
        // status gets to clear itself.
        status_timer.set_value(Some(Timeout::new(STATUS_TTL_MS, move || {
            set_status.set(None)
        })));
    };

    let update_content = move |ev| {
        let text = event_target_value(&ev);
        set_preview.set(pipeline.with_value(|p| p.render(&text)));
        persist(&filename.get_untracked(), &text);
        scheduler.update_value(|s| s.note_edit(now_ms()));
        set_content.set(text);
    };

    autosave_interval.set_value(Some(Interval::new(AUTOSAVE_INTERVAL_MS, move || {
        if scheduler.with_value(|s| s.should_save(now_ms())) {
            persist(&filename.get_untracked(), &content.get_untracked());
            show_saved();
        }
    })));
    on_cleanup(move || {
        autosave_interval.set_value(None);
        status_timer.set_value(None);
    });

    let open_document = Callback::new(move |name: String| {
        let text = match store.with_value(|s| s.get(&name)) {
            Ok(Some(text)) => text,
            Ok(None) => String::new(),
            Err(err) => {
                logging::warn!("failed to read `{name}`: {err}");
                String::new()
            }
        };
        if let Err(err) = store.with_value(|s| s.set_last_used_name(&name)) {
            logging::warn!("could not record active document: {err}");
        }
        set_filename.set(name);
        set_preview.set(pipeline.with_value(|p| p.render(&text)));
        set_content.set(text);
    });

    let create_document = Callback::new(move |_: ()| {
        let Ok(Some(raw)) = window().prompt_with_message("New document name") else {
            return;
        };
        let name = raw.trim().to_string();
        if name.is_empty() || reserved_name(&name) {
            return;
        }
        persist(&name, "");
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
            // snap the field back to the real name
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
                        &format!("{}.md", filename.get_untracked()),
                        &content.get_untracked(),
                    )>"Export"</button>
                    <button on:click=move |_| toggle_fullscreen()>"Fullscreen"</button>
                </header>
                <div style="display: flex; flex: 1; min-height: 0;">
                    <textarea
                        prop:value=move || content.get()
                        on:input=update_content
                        placeholder="Start writing markdown..."
                        spellcheck="false"
                        style="flex: 1; min-width: 0; padding: 1.5rem; border: none; outline: none; resize: none; font-family: ui-monospace, monospace; font-size: 14px; line-height: 1.6;"
                    ></textarea>
                    <div
                        inner_html=move || preview.get()
                        style="flex: 1; min-width: 0; padding: 1.5rem; overflow-y: auto; border-left: 1px solid #e5e7eb;"
                    ></div>
                </div>
            </section>
        </div>
    }
    .into_any()
}

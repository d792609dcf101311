use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;

use crate::block_editor::BlockEditor;
use crate::chart_editor::ChartEditor;
use crate::markdown_editor::MarkdownEditor;
use crate::store::DocumentEntry;

pub(crate) fn now_ms() -> f64 {
    js_sys::Date::now()
}

pub(crate) fn toggle_fullscreen() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    if document.fullscreen_element().is_some() {
        document.exit_fullscreen();
    } else if let Some(root) = document.document_element() {
        let _ = root.request_fullscreen();
    }
}

/// Serialize the current raw text as a download via a synthetic anchor.
pub(crate) fn export_document(filename: &str, text: &str) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let parts = js_sys::Array::new();
    parts.push(&JsValue::from_str(text));
    let Ok(blob) = web_sys::Blob::new_with_str_sequence(&parts) else {
        return;
    };
    let Ok(url) = web_sys::Url::create_object_url_with_blob(&blob) else {
        return;
    };
    if let Ok(element) = document.create_element("a") {
        if let Ok(anchor) = element.dyn_into::<web_sys::HtmlAnchorElement>() {
            anchor.set_href(&url);
            anchor.set_download(filename);
            anchor.click();
        }
    }
    let _ = web_sys::Url::revoke_object_url(&url);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Surface {
    Markdown,
    Chart,
    Blocks,
}

#[component]
pub fn App() -> impl IntoView {
    let (surface, set_surface) = signal(Surface::Markdown);

    let tab = move |target: Surface, label: &'static str| {
        view! {
            <button
                on:click=move |_| set_surface.set(target)
                style=move || format!(
                    "padding: 0.4rem 1rem; border: none; cursor: pointer; border-radius: 4px 4px 0 0; {}",
                    if surface.get() == target {
                        "background: #6366f1; color: white;"
                    } else {
                        "background: transparent; color: #6b7280;"
                    }
                )
            >
                {label}
            </button>
        }
    };

    view! {
        <main style="display: flex; flex-direction: column; height: 100vh; width: 100vw; font-family: system-ui, sans-serif;">
            <nav style="display: flex; gap: 0.25rem; align-items: flex-end; padding: 0.5rem 1rem 0; border-bottom: 1px solid #e5e7eb;">
                {tab(Surface::Markdown, "Markdown")}
                {tab(Surface::Chart, "Chart")}
                {tab(Surface::Blocks, "Blocks")}
            </nav>
            {move || match surface.get() {
                Surface::Markdown => view! { <MarkdownEditor/> }.into_any(),
                Surface::Chart => view! { <ChartEditor/> }.into_any(),
                Surface::Blocks => view! { <BlockEditor/> }.into_any(),
            }}
        </main>
    }
}

/// Saved-document list shared by all three surfaces: search box, new
/// button, select and per-item delete.
#[component]
pub fn DocumentSidebar(
    #[prop(into)] entries: Signal<Vec<DocumentEntry>>,
    #[prop(into)] active: Signal<String>,
    #[prop(into)] on_select: Callback<String>,
    #[prop(into)] on_new: Callback<()>,
    #[prop(into)] on_delete: Callback<String>,
) -> impl IntoView {
    let (query, set_query) = signal(String::new());

    let filtered = move || {
        let needle = query.get().to_lowercase();
        entries
            .get()
            .into_iter()
            .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
            .collect::<Vec<_>>()
    };

    view! {
        <nav style="width: 220px; border-right: 1px solid #e5e7eb; display: flex; flex-direction: column; background: #f9fafb;">
            <div style="display: flex; gap: 0.5rem; padding: 0.75rem; border-bottom: 1px solid #e5e7eb;">
                <input
                    placeholder="Search"
                    prop:value=move || query.get()
                    on:input=move |ev| set_query.set(event_target_value(&ev))
                    style="flex: 1; min-width: 0; padding: 0.35rem 0.5rem; border: 1px solid #e5e7eb; border-radius: 4px;"
                />
                <button
                    on:click=move |_| on_new.run(())
                    title="New document"
                    style="border: none; background: transparent; font-size: 1.2rem; cursor: pointer; color: #6b7280;"
                >
                    "+"
                </button>
            </div>
            <div style="flex: 1; overflow-y: auto; padding: 0.5rem;">
                {move || filtered().into_iter().map(|entry| {
                    let name = entry.name.clone();
                    let select_name = name.clone();
                    let delete_name = name.clone();
                    let highlight_name = name.clone();
                    let is_active = move || active.get() == highlight_name;
                    view! {
                        <div
                            style=move || format!(
                                "display: flex; align-items: center; padding: 0.35rem 0.5rem; margin-bottom: 2px; border-radius: 4px; cursor: pointer; font-size: 0.9rem; {}",
                                if is_active() { "background: #6366f1; color: white;" } else { "color: #374151;" }
                            )
                        >
                            <span
                                style="flex: 1; overflow: hidden; text-overflow: ellipsis; white-space: nowrap;"
                                on:click=move |_| on_select.run(select_name.clone())
                            >
                                {name.clone()}
                            </span>
                            <button
                                on:click=move |_| on_delete.run(delete_name.clone())
                                title="Delete"
                                style="border: none; background: transparent; cursor: pointer; color: inherit; opacity: 0.6;"
                            >
                                "×"
                            </button>
                        </div>
                    }
                }).collect::<Vec<_>>()}
            </div>
        </nav>
    }
}

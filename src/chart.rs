use leptos::logging;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::render::{ChartBackend, ChartHandle, RenderError};

#[wasm_bindgen]
extern "C" {
    pub type EchartsInstance;

    #[wasm_bindgen(js_namespace = echarts, js_name = init)]
    fn echarts_init(container: &web_sys::Element) -> EchartsInstance;

    #[wasm_bindgen(js_namespace = echarts, js_name = getInstanceByDom)]
    fn echarts_instance_by_dom(container: &web_sys::Element) -> Option<EchartsInstance>;

    #[wasm_bindgen(method, js_name = setOption, catch)]
    fn set_option(this: &EchartsInstance, option: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn resize(this: &EchartsInstance);

    #[wasm_bindgen(method, catch)]
    fn dispose(this: &EchartsInstance) -> Result<(), JsValue>;
}

/// Chart handle bound to one container element for the lifetime of a
/// render pass.
pub struct EchartsHandle {
    instance: EchartsInstance,
    container: String,
    disposed: bool,
}

impl ChartHandle for EchartsHandle {
    fn configure(&mut self, spec: &Value) -> Result<(), RenderError> {
        let option =
            serde_wasm_bindgen::to_value(spec).map_err(|err| RenderError::Configure {
                container: self.container.clone(),
                message: err.to_string(),
            })?;
        self.instance
            .set_option(&option)
            .map_err(|err| RenderError::Configure {
                container: self.container.clone(),
                message: format!("{err:?}"),
            })
    }

    fn resize(&self) {
        if !self.disposed {
            self.instance.resize();
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Err(err) = self.instance.dispose() {
            logging::warn!("chart dispose failed for `{}`: {err:?}", self.container);
        }
    }
}

/// Browser backend over the page-global `echarts` object.
#[derive(Clone, Copy, Default)]
pub struct EchartsBackend;

impl ChartBackend for EchartsBackend {
    type Handle = EchartsHandle;

    fn acquire(&self, container: &str) -> Result<EchartsHandle, RenderError> {
        let element = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(container))
            .ok_or_else(|| RenderError::MissingContainer {
                container: container.to_string(),
            })?;
        // A stale instance left on this element (e.g. from direct prior
        // use) would otherwise leak when we init over it.
        if let Some(stale) = echarts_instance_by_dom(&element) {
            if let Err(err) = stale.dispose() {
                logging::warn!("stale chart dispose failed for `{container}`: {err:?}");
            }
        }
        Ok(EchartsHandle {
            instance: echarts_init(&element),
            container: container.to_string(),
            disposed: false,
        })
    }
}

//! Overlay canvas the ink discs are painted on.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, window};

use crate::ink::InkDisc;

pub struct InkCanvas {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl InkCanvas {
    /// Create (or reuse) the overlay inside `host`, sized to it.
    pub fn attach(doc: &Document, host: &HtmlElement) -> Result<Self, JsValue> {
        let canvas: HtmlCanvasElement = match host.query_selector("canvas.ink-canvas")? {
            Some(el) => el.dyn_into()?,
            None => {
                let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
                c.set_class_name("ink-canvas");
                c.set_attribute(
                    "style",
                    "position:absolute; inset:0; pointer-events:none; z-index:2;",
                )?;
                host.style().set_property("position", "relative")?;
                host.append_child(&c)?;
                c
            }
        };
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("no 2d context"))?
            .dyn_into()?;
        let ink = Self { canvas, ctx };
        ink.resize(host)?;
        Ok(ink)
    }

    /// Match the host's CSS size at device resolution (integer DPR, min 1).
    pub fn resize(&self, host: &HtmlElement) -> Result<(), JsValue> {
        let rect = host.get_bounding_client_rect();
        let dpr = window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0)
            .floor()
            .max(1.0);
        self.canvas
            .set_width(((rect.width() * dpr).floor() as u32).max(1));
        self.canvas
            .set_height(((rect.height() * dpr).floor() as u32).max(1));
        let style = self.canvas.style();
        style.set_property("width", &format!("{}px", rect.width()))?;
        style.set_property("height", &format!("{}px", rect.height()))?;
        self.ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
        Ok(())
    }

    pub fn draw(&self, discs: &[InkDisc]) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        ctx.set_global_composite_operation("source-over")?;
        ctx.clear_rect(
            0.0,
            0.0,
            self.canvas.width() as f64,
            self.canvas.height() as f64,
        );
        if discs.is_empty() {
            return Ok(());
        }
        ctx.save();
        ctx.set_filter("blur(1.2px)");
        ctx.set_global_composite_operation("multiply")?;
        for d in discs {
            ctx.begin_path();
            ctx.set_fill_style_str(&format!("rgba(0,0,0,{:.3})", d.alpha));
            ctx.arc(d.x, d.y, d.radius, 0.0, std::f64::consts::TAU)?;
            ctx.fill();
        }
        ctx.restore();
        Ok(())
    }
}

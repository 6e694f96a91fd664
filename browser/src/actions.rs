//! Vision action dispatch: coordinate-based interaction with a page plus
//! the screenshot action, routed by the `vision.*`/`snapshot.*` action-type
//! prefix. Every action returns a success/error value rather than
//! propagating an exception, so the caller can always attach current tab
//! state to the dispatcher's result (spec §9 "error-as-data in actions").

use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    MouseButton,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BrowserError, Result};
use crate::types::{AnimationsOption, CaretOption, ScreenshotFormat, ScreenshotOptions};

const FREEZE_ANIMATIONS_CSS: &str = "*, *::before, *::after { animation-play-state: paused !important; transition: none !important; }";
const HIDE_CARET_CSS: &str = "*, *::before, *::after { caret-color: transparent !important; }";

/// Route a dispatched action by its `vision.`/`snapshot.` prefix.
pub async fn dispatch(
    page: &Page,
    action_type: &str,
    params: &Value,
    share_root: &Path,
    box_id: &str,
) -> Result<Value> {
    if let Some(action) = action_type.strip_prefix("vision.") {
        dispatch_vision(page, action, params, share_root, box_id).await
    } else if action_type.strip_prefix("snapshot.").is_some() {
        // Reserved for DOM-accessibility-tree actions; no snapshot.* action
        // is implemented yet, so any request here is unknown by design.
        Err(BrowserError::UnknownAction(action_type.to_string()))
    } else {
        Err(BrowserError::UnknownAction(action_type.to_string()))
    }
}

async fn dispatch_vision(
    page: &Page,
    action: &str,
    params: &Value,
    share_root: &Path,
    box_id: &str,
) -> Result<Value> {
    match action {
        "click" => {
            let p: Point = parse(params)?;
            click_at(page, p.x, p.y, MouseButton::Left, 1).await?;
            Ok(Value::Null)
        }
        "double_click" => {
            let p: Point = parse(params)?;
            click_at(page, p.x, p.y, MouseButton::Left, 2).await?;
            Ok(Value::Null)
        }
        "type" => {
            let p: TypeParams = parse(params)?;
            page.type_str(&p.text)
                .await
                .map_err(|e| BrowserError::Cdp(e))?;
            Ok(Value::Null)
        }
        "drag" => {
            let p: DragParams = parse(params)?;
            drag_path(page, &p.path).await?;
            Ok(Value::Null)
        }
        "key" => {
            let p: KeyParams = parse(params)?;
            for key in &p.keys {
                dispatch_key(page, key).await?;
            }
            Ok(Value::Null)
        }
        "move" => {
            let p: Point = parse(params)?;
            move_to(page, p.x, p.y).await?;
            Ok(Value::Null)
        }
        "scroll" => {
            let p: ScrollParams = parse(params)?;
            page.evaluate(format!("window.scrollBy({}, {})", p.dx, p.dy))
                .await
                .map_err(BrowserError::Cdp)?;
            Ok(Value::Null)
        }
        "screenshot" => {
            let opts: ScreenshotOptions = parse(params)?;
            let path = screenshot(page, &opts, share_root, box_id).await?;
            Ok(serde_json::json!({ "path": path.to_string_lossy() }))
        }
        other => Err(BrowserError::UnknownAction(format!("vision.{other}"))),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(params: &Value) -> Result<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| BrowserError::UnknownAction(format!("invalid action params: {e}")))
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct TypeParams {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DragParams {
    path: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct KeyParams {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ScrollParams {
    dx: f64,
    dy: f64,
}

async fn move_to(page: &Page, x: f64, y: f64) -> Result<()> {
    page.execute(
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    Ok(())
}

async fn click_at(page: &Page, x: f64, y: f64, button: MouseButton, click_count: i64) -> Result<()> {
    move_to(page, x, y).await?;
    page.execute(
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(x)
            .y(y)
            .button(button.clone())
            .click_count(click_count)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    page.execute(
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(x)
            .y(y)
            .button(button)
            .click_count(click_count)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    Ok(())
}

async fn drag_path(page: &Page, path: &[Point]) -> Result<()> {
    let Some(first) = path.first() else {
        return Err(BrowserError::UnknownAction("drag path must not be empty".to_string()));
    };
    move_to(page, first.x, first.y).await?;
    page.execute(
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MousePressed)
            .x(first.x)
            .y(first.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;

    for point in &path[1..] {
        move_to(page, point.x, point.y).await?;
    }

    let last = path.last().unwrap();
    page.execute(
        DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseReleased)
            .x(last.x)
            .y(last.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    Ok(())
}

async fn dispatch_key(page: &Page, key: &str) -> Result<()> {
    page.execute(
        DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    page.execute(
        DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .build()
            .map_err(BrowserError::UnknownAction)?,
    )
    .await
    .map_err(BrowserError::Cdp)?;
    Ok(())
}

/// Resolve the save path per spec: absolute paths are used as-is, relative
/// paths are joined under `{share_root}/{box_id}/screenshot/`, and no path
/// at all falls back to a timestamped default. Intermediate directories are
/// created on demand.
fn resolve_screenshot_path(opts: &ScreenshotOptions, share_root: &Path, box_id: &str) -> PathBuf {
    let dir = share_root.join(box_id).join("screenshot");
    match &opts.path {
        Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
        Some(p) => dir.join(p),
        None => {
            let stamp = stamp_placeholder();
            dir.join(format!("screenshot_{stamp}.{}", opts.r#type.extension()))
        }
    }
}

fn stamp_placeholder() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Inject a `<style>` element honoring the capture's animations/caret
/// options. Returns the JS to run afterward to remove it, if anything was
/// injected.
async fn inject_capture_style(page: &Page, opts: &ScreenshotOptions) -> Result<Option<String>> {
    let mut css = String::new();
    if opts.animations == AnimationsOption::Disabled {
        css.push_str(FREEZE_ANIMATIONS_CSS);
    }
    if opts.caret == CaretOption::Hide {
        css.push_str(HIDE_CARET_CSS);
    }
    if css.is_empty() {
        return Ok(None);
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    let inject_js = format!(
        "(() => {{ const s = document.createElement('style'); s.id = {id:?}; s.textContent = {css:?}; document.head.appendChild(s); }})()"
    );
    page.evaluate(inject_js).await.map_err(BrowserError::Cdp)?;
    Ok(Some(format!(
        "(() => {{ const s = document.getElementById({id:?}); if (s) s.remove(); }})()"
    )))
}

async fn screenshot(
    page: &Page,
    opts: &ScreenshotOptions,
    share_root: &Path,
    box_id: &str,
) -> Result<PathBuf> {
    let format = match opts.r#type {
        ScreenshotFormat::Png => chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat::Png,
        ScreenshotFormat::Jpeg => chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat::Jpeg,
    };

    let mut builder = ScreenshotParams::builder().format(format).full_page(opts.full_page);
    if let Some(quality) = opts.quality {
        builder = builder.quality(quality as i64);
    }
    if let Some(clip) = &opts.clip {
        builder = builder.clip(chromiumoxide::cdp::browser_protocol::page::Viewport {
            x: clip.x,
            y: clip.y,
            width: clip.width,
            height: clip.height,
            scale: 1.0,
        });
    }
    builder = builder.omit_background(opts.omit_background);

    let injected_style = inject_capture_style(page, opts).await?;

    let bytes = page
        .screenshot(builder.build())
        .await
        .map_err(BrowserError::Cdp)?;

    if let Some(remove_js) = injected_style {
        let _ = page.evaluate(remove_js).await;
    }

    let path = resolve_screenshot_path(opts, share_root, box_id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScreenshotScale;

    fn opts(path: Option<&str>) -> ScreenshotOptions {
        ScreenshotOptions {
            r#type: ScreenshotFormat::Png,
            quality: None,
            full_page: false,
            clip: None,
            omit_background: false,
            scale: ScreenshotScale::Css,
            animations: Default::default(),
            caret: Default::default(),
            timeout_ms: None,
            path: path.map(|s| s.to_string()),
        }
    }

    #[test]
    fn absolute_path_used_as_is() {
        let resolved = resolve_screenshot_path(&opts(Some("/tmp/out.png")), Path::new("/share"), "box-1");
        assert_eq!(resolved, PathBuf::from("/tmp/out.png"));
    }

    #[test]
    fn relative_path_joined_under_share_root() {
        let resolved = resolve_screenshot_path(&opts(Some("shot.png")), Path::new("/share"), "box-1");
        assert_eq!(resolved, PathBuf::from("/share/box-1/screenshot/shot.png"));
    }

    #[test]
    fn absent_path_defaults_under_share_root() {
        let resolved = resolve_screenshot_path(&opts(None), Path::new("/share"), "box-1");
        assert!(resolved.starts_with("/share/box-1/screenshot"));
        assert!(resolved.extension().is_some());
    }
}

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::HtmlImageElement;

use trainmap_shared::scene::GlyphCatalog;
use trainmap_shared::{ClientError, MilepostKind, ViewBox};

use crate::config;

/// A decoded SVG with the viewBox read from its source.
#[derive(Clone)]
pub struct SvgAsset {
    pub view_box: Option<ViewBox>,
    pub image: HtmlImageElement,
}

#[derive(Clone)]
struct Glyph {
    size: (f64, f64),
    image: HtmlImageElement,
}

/// Session-lifetime cache of the map backdrop and terrain glyphs.
#[derive(Default)]
pub struct AssetCache {
    map: Option<(String, SvgAsset)>,
    glyphs: HashMap<String, Glyph>,
    requested: HashSet<String>,
}

pub type SharedAssets = Rc<RefCell<AssetCache>>;

impl AssetCache {
    pub fn map_for(&self, geography: &str) -> Option<&SvgAsset> {
        self.map
            .as_ref()
            .filter(|(geo, _)| geo == geography)
            .map(|(_, asset)| asset)
    }

    pub fn glyph_image(&self, kind: &str) -> Option<&HtmlImageElement> {
        self.glyphs.get(kind).map(|g| &g.image)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Returns false if `key` was already fetched or is in flight.
    fn claim(&mut self, key: String) -> bool {
        self.requested.insert(key)
    }
}

impl GlyphCatalog for AssetCache {
    fn glyph_size(&self, kind: &str) -> Option<(f64, f64)> {
        self.glyphs.get(kind).map(|g| g.size)
    }
}

fn svg_data_url(source: &str) -> String {
    format!(
        "data:image/svg+xml;charset=utf-8,{}",
        String::from(js_sys::encode_uri_component(source))
    )
}

pub async fn load_svg(url: &str) -> Result<SvgAsset, ClientError> {
    let response = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| ClientError::Network(format!("fetch error: {e}")))?;
    if !response.ok() {
        return Err(ClientError::Network(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }
    let source = response
        .text()
        .await
        .map_err(|e| ClientError::Network(format!("read error: {e}")))?;

    let image = HtmlImageElement::new()
        .map_err(|e| ClientError::Network(format!("image element: {e:?}")))?;
    image.set_src(&svg_data_url(&source));
    JsFuture::from(image.decode())
        .await
        .map_err(|e| ClientError::Network(format!("could not decode {url}: {e:?}")))?;

    Ok(SvgAsset {
        view_box: ViewBox::from_svg(&source),
        image,
    })
}

/// Fetch the backdrop for `geography` unless it is already cached.
pub fn request_map(assets: &SharedAssets, geography: &str, on_loaded: Rc<dyn Fn()>) {
    if !assets.borrow_mut().claim(format!("map:{geography}")) {
        return;
    }
    let assets = assets.clone();
    let geography = geography.to_string();
    spawn_local(async move {
        match load_svg(&config::map_asset_url(&geography)).await {
            Ok(asset) => {
                debug!(%geography, view_box = ?asset.view_box, "map asset loaded");
                assets.borrow_mut().map = Some((geography, asset));
                on_loaded();
            }
            Err(e) => {
                warn!(%geography, error = %e, "map asset unavailable; drawing mileposts only");
                assets.borrow_mut().requested.remove(&format!("map:{geography}"));
            }
        }
    });
}

/// Fetch glyphs for terrain kinds not yet cached. Kinds are wire names
/// (`DESERT`); files are looked up by their lowercased name.
pub fn request_glyphs<I, S>(assets: &SharedAssets, kinds: I, on_loaded: Rc<dyn Fn()>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for kind in kinds {
        let kind = kind.as_ref().to_string();
        let Some(asset_name) = MilepostKind::from(kind.clone()).asset_name() else {
            continue;
        };
        if !assets.borrow_mut().claim(format!("glyph:{kind}")) {
            continue;
        }
        let assets = assets.clone();
        let on_loaded = on_loaded.clone();
        spawn_local(async move {
            let asset = match load_svg(&config::glyph_asset_url(&asset_name)).await {
                Ok(asset) => asset,
                Err(e) => {
                    warn!(%kind, error = %e, "glyph unavailable");
                    assets.borrow_mut().requested.remove(&format!("glyph:{kind}"));
                    return;
                }
            };
            let natural = (
                asset.image.natural_width() as f64,
                asset.image.natural_height() as f64,
            );
            let size = asset
                .view_box
                .map(|vb| vb.size())
                .or((natural.0 > 0.0 && natural.1 > 0.0).then_some(natural));
            let Some(size) = size else {
                warn!(%kind, "glyph has no intrinsic size");
                return;
            };
            assets.borrow_mut().glyphs.insert(
                kind,
                Glyph {
                    size,
                    image: asset.image,
                },
            );
            on_loaded();
        });
    }
}

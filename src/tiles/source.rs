use crate::core::geo::TileCoord;
use std::path::PathBuf;

/// Trait representing anything that can name tiles, both on the network and on disk.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;

    /// Path of the cached copy, relative to the cache root.
    fn cache_path(&self, coord: TileCoord) -> PathBuf;
}

/// Source driven by a URL template such as `https://{s}.tile.example.org/{z}/{x}/{y}.png`.
///
/// Recognized placeholders: `{z}` or `{zoom}`, `{x}`, `{y}`, `{s}` (rotating
/// subdomain) and `{r}` (`@2x` for retina sources).
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSource {
    cache_name: String,
    template: String,
    subdomains: Vec<String>,
    retina: bool,
}

impl TemplateSource {
    pub fn new(cache_name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            template: template.into(),
            subdomains: Vec::new(),
            retina: false,
        }
    }

    pub fn with_subdomains<I, S>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retina(mut self, retina: bool) -> Self {
        self.retina = retina;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Default OpenStreetMap tiles
    pub fn openstreetmap() -> Self {
        Self::new("Tiles Cache", "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")
            .with_subdomains(["a", "b", "c"])
    }

    /// High-DPI OpenStreetMap rendering
    pub fn osm_retina() -> Self {
        Self::new("Retina Tiles Cache", "https://c.osm.rrze.fau.de/osmhd/{z}/{x}/{y}.png")
    }

    pub fn carto_dark_matter() -> Self {
        Self::new(
            "CartoDB Dark Matter",
            "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
        )
        .with_subdomains(["a", "b", "c", "d"])
    }

    pub fn carto_voyager() -> Self {
        Self::new(
            "CartoDB Voyager",
            "https://{s}.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}{r}.png",
        )
        .with_subdomains(["a", "b", "c", "d"])
    }

    pub fn yandex_satellite() -> Self {
        Self::new(
            "Yandex Satellite Tiles Cache",
            "https://sat01.maps.yandex.net/tiles?l=sat&v=1.35.0&x={x}&y={y}&z={z}",
        )
    }

    fn subdomain(&self, coord: TileCoord) -> &str {
        if self.subdomains.is_empty() {
            return "";
        }
        let idx = ((coord.x as u64 + coord.y as u64) % self.subdomains.len() as u64) as usize;
        &self.subdomains[idx]
    }
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self::openstreetmap()
    }
}

impl TileSource for TemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        self.template
            .replace("{zoom}", &coord.z.to_string())
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{s}", self.subdomain(coord))
            .replace("{r}", if self.retina { "@2x" } else { "" })
    }

    fn cache_path(&self, coord: TileCoord) -> PathBuf {
        PathBuf::from(&self.cache_name)
            .join(coord.z.to_string())
            .join(format!("{}.{}.png", coord.x, coord.y))
    }
}

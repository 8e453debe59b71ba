use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Config, ConfigError};
use crate::render::frame::TextStyle;

/// Size of the persistent staging buffer used for image uploads (1 MiB)
pub const DEFAULT_STAGING_BYTES: u64 = 1 << 20;

/// # Shader Configuration
///
/// Paths to the compiled SPIR-V sprite shaders. Supports path resolution so the
/// game can be launched from the workspace root or from the binary's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the usual build output and resource locations in order and keeps the
    /// first hit for each stage.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = ["target/shaders/", "shaders/", "resources/shaders/", "../target/shaders/", "./"];

        let resolve = |file: &str| {
            shader_dirs
                .iter()
                .map(|dir| format!("{dir}{file}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("target/shaders/{file}"))
        };

        Self {
            vertex_shader_path: resolve(base_vertex),
            fragment_shader_path: resolve(base_fragment),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(ConfigError::Invalid(format!("Vertex shader not found: {}", self.vertex_shader_path)));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(ConfigError::Invalid(format!(
                "Fragment shader not found: {}",
                self.fragment_shader_path
            )));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("sprite.vert.spv", "sprite.frag.spv")
    }
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Pong".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Fixed capacities of every GPU-side resource.
///
/// These are a design budget: exceeding any of them during a frame is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLimits {
    /// Bytes available in the staging buffer; bounds the largest uploadable image
    pub staging_bytes: u64,
    /// Maximum number of distinct uploaded images
    pub max_images: usize,
    /// Maximum number of distinct descriptor sets
    pub max_descriptors: usize,
    /// Maximum sprite instances (entities plus glyphs) per frame
    pub max_instances: usize,
    /// Maximum entries in the material table
    pub max_materials: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            staging_bytes: DEFAULT_STAGING_BYTES,
            max_images: 16,
            max_descriptors: 16,
            max_instances: 1000,
            max_materials: 100,
        }
    }
}

impl RenderLimits {
    /// Reject zero-sized budgets
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("staging_bytes", self.staging_bytes == 0),
            ("max_images", self.max_images == 0),
            ("max_descriptors", self.max_descriptors == 0),
            ("max_instances", self.max_instances == 0),
            ("max_materials", self.max_materials == 0),
        ];

        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ConfigError::Invalid(format!("{name} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

/// # Renderer Configuration
///
/// Everything the sprite renderer needs at initialization: application metadata,
/// window, shaders, resource budgets and text layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Window parameters
    pub window: WindowConfig,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Resource capacities
    pub limits: RenderLimits,
    /// Clear color of the render pass
    pub clear_color: [f32; 4],
    /// Whether to enable Vulkan validation layers (auto-detected when unset)
    pub enable_validation: Option<bool>,
    /// How long to wait for the previous frame's fence, in nanoseconds.
    /// Unset waits forever; hitting a finite timeout is a fatal error.
    pub frame_timeout_ns: Option<u64>,
    /// Glyph layout used for labels
    pub text: TextStyle,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            window: WindowConfig::default(),
            shaders: ShaderConfig::default(),
            limits: RenderLimits::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            enable_validation: None,
            frame_timeout_ns: None,
            text: TextStyle::default(),
        }
    }

    /// Set custom shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set resource capacities
    #[must_use]
    pub fn with_limits(mut self, limits: RenderLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Give up on a frame whose fence has not signaled after `timeout_ns`
    #[must_use]
    pub fn with_frame_timeout(mut self, timeout_ns: u64) -> Self {
        self.frame_timeout_ns = Some(timeout_ns);
        self
    }

    /// Set the label text style
    #[must_use]
    pub fn with_text_style(mut self, text: TextStyle) -> Self {
        self.text = text;
        self
    }

    /// Enable or disable validation layers
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Fence wait timeout in nanoseconds; `u64::MAX` when unset
    pub fn fence_timeout(&self) -> u64 {
        self.frame_timeout_ns.unwrap_or(u64::MAX)
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("Window size must be non-zero".to_string()));
        }

        if self.shaders.vertex_shader_path.is_empty() || self.shaders.fragment_shader_path.is_empty() {
            return Err(ConfigError::Invalid("Shader paths cannot be empty".to_string()));
        }

        if self.frame_timeout_ns == Some(0) {
            return Err(ConfigError::Invalid("Frame timeout must be greater than zero".to_string()));
        }

        if self.text.glyph_advance <= 0.0 || self.text.line_height <= 0.0 {
            return Err(ConfigError::Invalid("Glyph advance and line height must be positive".to_string()));
        }

        self.limits.validate()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Pong")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::assets::AssetId;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.staging_bytes, 1024 * 1024);
        assert_eq!(config.fence_timeout(), u64::MAX);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let limits = RenderLimits { max_descriptors: 0, ..RenderLimits::default() };
        let config = RendererConfig::default().with_limits(limits);

        match config.validate() {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("max_descriptors")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_builders_and_zero_timeout() {
        let style = TextStyle {
            glyph_advance: 8.0,
            ..TextStyle::default()
        };
        let config = RendererConfig::new("Builder")
            .with_shaders(ShaderConfig::new("a.vert.spv", "a.frag.spv"))
            .with_text_style(style)
            .with_frame_timeout(1_000_000);

        assert_eq!(config.shaders.vertex_shader_path, "a.vert.spv");
        approx::assert_relative_eq!(config.text.glyph_advance, 8.0);
        assert_eq!(config.fence_timeout(), 1_000_000);
        assert!(config.validate().is_ok());

        assert!(config.with_frame_timeout(0).validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = RendererConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let path = file.path().to_str().unwrap();

        let mut config = RendererConfig::new("Round Trip").with_validation(false);
        config.text.font = AssetId(7);
        config.limits.max_instances = 64;
        config.save_to_file(path).unwrap();

        let loaded = RendererConfig::load_from_file(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let file = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
        let path = file.path().to_str().unwrap();

        let config = RendererConfig::new("Ron Config");
        config.save_to_file(path).unwrap();

        let loaded = RendererConfig::load_from_file(path).unwrap();
        assert_eq!(loaded.application_name, "Ron Config");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"application_name = \"Partial\"\n[limits]\nmax_images = 4\n").unwrap();

        let loaded = RendererConfig::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.application_name, "Partial");
        assert_eq!(loaded.limits.max_images, 4);
        assert_eq!(loaded.limits.max_materials, RenderLimits::default().max_materials);
    }

    #[test]
    fn test_unsupported_extension() {
        let config = RendererConfig::default();
        assert!(matches!(
            config.save_to_file("renderer.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = RendererConfig::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, RendererConfig::default());
    }

    #[test]
    fn test_shader_validation_checks_files() {
        let vertex = NamedTempFile::new().unwrap();
        let fragment = NamedTempFile::new().unwrap();

        let shaders = ShaderConfig::new(
            vertex.path().to_str().unwrap(),
            fragment.path().to_str().unwrap(),
        );
        assert!(shaders.validate().is_ok());

        let missing = ShaderConfig::new("does/not/exist.spv", fragment.path().to_str().unwrap());
        assert!(missing.validate().is_err());
    }
}

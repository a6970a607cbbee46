use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionTier {
    #[value(alias = "1080p", alias = "hd")]
    Standard,
    #[value(alias = "4k", alias = "uhd")]
    High,
}

impl ResolutionTier {
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "1080p",
            Self::High => "4k",
        }
    }

    /// Landscape size for this tier.
    pub fn landscape_size(self) -> (u32, u32) {
        match self {
            Self::Standard => (1920, 1080),
            Self::High => (3840, 2160),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AspectRatio {
    #[value(alias = "16:9", alias = "wide")]
    Landscape,
    #[value(alias = "9:16", alias = "tall")]
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfiguration {
    pub resolution_tier: ResolutionTier,
    pub aspect_ratio: AspectRatio,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        Self {
            resolution_tier: ResolutionTier::Standard,
            aspect_ratio: AspectRatio::Landscape,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Preview,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_usize(self) -> (usize, usize) {
        (self.width as usize, self.height as usize)
    }

    /// Scale factor for pixel constants tuned at 1080 lines on the short side.
    pub fn unit(self) -> f32 {
        (self.width.min(self.height) as f32 / 1080.0).max(0.05)
    }
}

/// Output pixel size: the live container in preview, the export tier in capture.
pub fn resolve(
    mode: RenderMode,
    export: &ExportConfiguration,
    container: (u32, u32),
) -> Dimensions {
    match mode {
        RenderMode::Preview => Dimensions::new(container.0, container.1),
        RenderMode::Capture => {
            let (w, h) = export.resolution_tier.landscape_size();
            match export.aspect_ratio {
                AspectRatio::Landscape => Dimensions::new(w, h),
                AspectRatio::Portrait => Dimensions::new(h, w),
            }
        }
    }
}

//! Layer compositing.
//!
//! Layers are drawn in a fixed z-order regardless of the order they were
//! added: opaque base, data, day haze, then linework on top. Each layer is
//! blended with "replace-if-key-color-else-over": pixels matching the layer's
//! key color are transparent, every other pixel is drawn over the canvas at
//! the layer's opacity.

use map_common::{MapError, MapResult};
use rayon::prelude::*;
use tracing::debug;

use crate::canvas::{Canvas, PARALLEL_THRESHOLD};
use crate::ramp::Rgb;

/// Position of a layer in the stack. Lower variants are drawn first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Base,
    Data,
    Haze,
    Linework,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Base => "base",
            LayerKind::Data => "data",
            LayerKind::Haze => "haze",
            LayerKind::Linework => "linework",
        }
    }
}

/// Color treated as transparent, with a per-channel tolerance for
/// anti-aliased fringes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColor {
    pub color: Rgb,
    pub tolerance: u8,
}

impl KeyColor {
    pub fn new(color: Rgb, tolerance: u8) -> Self {
        Self { color, tolerance }
    }

    pub fn exact(color: Rgb) -> Self {
        Self::new(color, 0)
    }

    pub fn matches(&self, rgb: Rgb) -> bool {
        rgb.within(self.color, self.tolerance)
    }
}

/// One image in the stack.
#[derive(Debug, Clone)]
pub struct CompositeLayer {
    pub kind: LayerKind,
    pub image: Canvas,
    pub opacity: f32,
    pub key: Option<KeyColor>,
}

impl CompositeLayer {
    pub fn new(kind: LayerKind, image: Canvas) -> Self {
        Self {
            kind,
            image,
            opacity: 1.0,
            key: None,
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_key(mut self, key: KeyColor) -> Self {
        self.key = Some(key);
        self
    }

    /// Opaque base layer of one flat color.
    pub fn solid_base(width: u32, height: u32, color: Rgb) -> Self {
        Self::new(LayerKind::Base, Canvas::new(width, height, color))
    }

    /// Translucent veil of one flat color.
    pub fn haze(width: u32, height: u32, color: Rgb, opacity: f32) -> Self {
        Self::new(LayerKind::Haze, Canvas::new(width, height, color)).with_opacity(opacity)
    }

    /// Line art overlay. With `invert`, ink-on-white art becomes light-on-dark
    /// before keying.
    pub fn linework(mut image: Canvas, key: KeyColor, invert: bool) -> Self {
        if invert {
            image.invert();
        }
        Self::new(LayerKind::Linework, image).with_key(key)
    }
}

/// An ordered set of layers for one canvas size.
#[derive(Debug, Clone)]
pub struct LayerStack {
    width: u32,
    height: u32,
    layers: Vec<CompositeLayer>,
}

impl LayerStack {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
        }
    }

    pub fn push(&mut self, layer: CompositeLayer) {
        self.layers.push(layer);
    }

    pub fn with(mut self, layer: CompositeLayer) -> Self {
        self.push(layer);
        self
    }

    /// Composite onto a fresh black canvas.
    pub fn render(&self) -> MapResult<Canvas> {
        self.check_dimensions()?;
        let mut canvas = Canvas::new(self.width, self.height, Rgb::BLACK);
        self.composite_onto(&mut canvas)?;
        Ok(canvas)
    }

    /// Composite every layer onto `canvas`.
    ///
    /// All sizes are checked before the first pixel is touched, so on a
    /// mismatch `canvas` is left exactly as it was.
    pub fn composite_onto(&self, canvas: &mut Canvas) -> MapResult<()> {
        if canvas.width() != self.width || canvas.height() != self.height {
            return Err(MapError::dimension_mismatch(
                "canvas",
                (self.width, self.height),
                (canvas.width(), canvas.height()),
            ));
        }
        self.check_dimensions()?;

        let mut order: Vec<&CompositeLayer> = self.layers.iter().collect();
        order.sort_by_key(|layer| layer.kind);

        for layer in order {
            debug!(layer = layer.kind.name(), opacity = layer.opacity, "Compositing layer");
            blend_layer(canvas, layer);
        }
        Ok(())
    }

    fn check_dimensions(&self) -> MapResult<()> {
        for layer in &self.layers {
            let (w, h) = (layer.image.width(), layer.image.height());
            if w != self.width || h != self.height {
                return Err(MapError::dimension_mismatch(
                    layer.kind.name(),
                    (self.width, self.height),
                    (w, h),
                ));
            }
        }
        Ok(())
    }
}

fn blend_layer(canvas: &mut Canvas, layer: &CompositeLayer) {
    let alpha = layer.opacity;
    if alpha <= 0.0 {
        return;
    }
    let key = layer.key;
    let large = canvas.pixel_count() >= PARALLEL_THRESHOLD;
    let src = layer.image.pixels();
    let dst = canvas.pixels_mut();

    let blend = |(out, inp): (&mut [u8], &[u8])| {
        let rgb = Rgb::new(inp[0], inp[1], inp[2]);
        if key.is_some_and(|k| k.matches(rgb)) {
            return;
        }
        if alpha >= 1.0 {
            out.copy_from_slice(inp);
            return;
        }
        for (o, i) in out.iter_mut().zip(inp) {
            *o = (*i as f32 * alpha + *o as f32 * (1.0 - alpha)).round() as u8;
        }
    };

    if large {
        dst.par_chunks_mut(3).zip(src.par_chunks(3)).for_each(blend);
    } else {
        dst.chunks_mut(3).zip(src.chunks(3)).for_each(blend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_kind_order() {
        assert!(LayerKind::Base < LayerKind::Data);
        assert!(LayerKind::Data < LayerKind::Haze);
        assert!(LayerKind::Haze < LayerKind::Linework);
    }

    #[test]
    fn test_opaque_layer_replaces() {
        let canvas = LayerStack::new(2, 2)
            .with(CompositeLayer::solid_base(2, 2, Rgb::new(10, 20, 30)))
            .render()
            .unwrap();
        assert!(canvas.is_uniform(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn test_key_color_is_transparent() {
        let mut data = Canvas::new(2, 1, Rgb::WHITE);
        data.put(1, 0, Rgb::new(200, 0, 0));
        let canvas = LayerStack::new(2, 1)
            .with(CompositeLayer::solid_base(2, 1, Rgb::new(0, 0, 90)))
            .with(CompositeLayer::new(LayerKind::Data, data).with_key(KeyColor::new(Rgb::WHITE, 8)))
            .render()
            .unwrap();
        assert_eq!(canvas.get(0, 0), Rgb::new(0, 0, 90));
        assert_eq!(canvas.get(1, 0), Rgb::new(200, 0, 0));
    }

    #[test]
    fn test_tolerance_absorbs_fringe() {
        let key = KeyColor::new(Rgb::WHITE, 10);
        assert!(key.matches(Rgb::new(250, 246, 255)));
        assert!(!key.matches(Rgb::new(244, 255, 255)));
        assert!(KeyColor::exact(Rgb::BLACK).matches(Rgb::BLACK));
    }

    #[test]
    fn test_over_blend_uses_opacity() {
        let canvas = LayerStack::new(1, 1)
            .with(CompositeLayer::solid_base(1, 1, Rgb::new(0, 0, 0)))
            .with(CompositeLayer::haze(1, 1, Rgb::new(200, 100, 50), 0.25))
            .render()
            .unwrap();
        assert_eq!(canvas.get(0, 0), Rgb::new(50, 25, 13));
    }

    #[test]
    fn test_z_order_ignores_insertion_order() {
        let ink = Canvas::new(1, 1, Rgb::BLACK); // becomes white when inverted
        let canvas = LayerStack::new(1, 1)
            .with(CompositeLayer::linework(ink, KeyColor::exact(Rgb::BLACK), true))
            .with(CompositeLayer::haze(1, 1, Rgb::new(100, 100, 100), 0.5))
            .with(CompositeLayer::solid_base(1, 1, Rgb::new(0, 0, 200)))
            .render()
            .unwrap();
        assert_eq!(canvas.get(0, 0), Rgb::WHITE);
    }

    #[test]
    fn test_mismatch_leaves_canvas_untouched() {
        let mut canvas = Canvas::new(4, 2, Rgb::new(1, 1, 1));
        let stack = LayerStack::new(4, 2)
            .with(CompositeLayer::solid_base(4, 2, Rgb::WHITE))
            .with(CompositeLayer::new(LayerKind::Linework, Canvas::new(3, 2, Rgb::WHITE)));

        let err = stack.composite_onto(&mut canvas).unwrap_err();
        assert!(matches!(err, MapError::DimensionMismatch { ref layer, .. } if layer == "linework"));
        assert!(canvas.is_uniform(Rgb::new(1, 1, 1)));
    }
}

//! Randomized viewport and resolution sampling for GetMap requests.

use crate::capabilities::{BoundingBox, Layer};
use rand::prelude::*;
use thiserror::Error;

/// Fixed raster and zoom parameters shared by every sampled request.
///
/// Passed explicitly into request construction; nothing here is mutated
/// between iterations.
#[derive(Debug, Clone)]
pub struct SamplerParams {
    /// Output raster side length in pixels (requests are square).
    pub raster_size: u32,
    /// Finest supported zoom, in meters per pixel.
    pub min_resolution: f64,
    /// Requested image mime type, e.g. `image/jpeg`.
    pub image_format: String,
}

impl SamplerParams {
    /// Largest power-of-two exponent above `min_resolution` that still fits
    /// the layer's shorter dimension into the raster.
    ///
    /// Errors when the layer is too small to render even at the finest zoom;
    /// the exponent formula is undefined in that case, so it is a hard
    /// precondition rather than a fallback.
    pub fn max_exponent(&self, layer: &Layer) -> Result<u32, SampleError> {
        let max_resolution =
            layer.bbox.width().min(layer.bbox.height()) / self.raster_size as f64;
        if max_resolution < self.min_resolution {
            return Err(SampleError::LayerTooSmall {
                layer: layer.name.clone(),
                max_resolution,
                min_resolution: self.min_resolution,
                raster_size: self.raster_size,
            });
        }
        Ok((max_resolution / self.min_resolution).log2().floor() as u32)
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error(
        "layer '{layer}' is too small for a {raster_size}px raster: \
         max usable resolution {max_resolution} m/px is below the \
         {min_resolution} m/px floor"
    )]
    LayerTooSmall {
        layer: String,
        max_resolution: f64,
        min_resolution: f64,
        raster_size: u32,
    },
}

/// One fully-specified GetMap request.
#[derive(Debug, Clone)]
pub struct MapRequest {
    pub layer: String,
    pub srs: String,
    pub bbox: BoundingBox,
    /// Meters per pixel of the sampled viewport.
    pub resolution: f64,
    pub raster_size: u32,
    pub format: String,
}

impl MapRequest {
    /// Label identifying this request class in metrics and on disk,
    /// e.g. `WMS-GetMap-roads-0.40m`.
    pub fn label(&self) -> String {
        format!("WMS-GetMap-{}-{:.2}m", self.layer, self.resolution)
    }

    /// Build the GetMap URL against a base endpoint.
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/wms?service=wms&version=1.1.1&request=GetMap&layers={}&styles=&srs={}\
             &width={}&height={}&format={}&bbox={},{},{},{}",
            base_url,
            self.layer,
            self.srs,
            self.raster_size,
            self.raster_size,
            self.format,
            self.bbox.min_x,
            self.bbox.min_y,
            self.bbox.max_x,
            self.bbox.max_y
        )
    }
}

/// Samples random viewports over layer bounding boxes.
pub struct ViewportSampler {
    params: SamplerParams,
    rng: StdRng,
}

impl ViewportSampler {
    /// Create a sampler. A seed gives reproducible request sequences.
    pub fn new(params: SamplerParams, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { params, rng }
    }

    /// Sample one randomized viewport for `layer`.
    ///
    /// The resolution is drawn from a discrete power-of-two ladder between
    /// the configured floor and the coarsest zoom that still fits the
    /// layer's shorter dimension into the raster, so coverage concentrates
    /// on a handful of distinct zoom levels. The viewport origin is then
    /// drawn uniformly so the request bbox stays inside the layer bbox.
    pub fn sample(&mut self, layer: &Layer) -> Result<MapRequest, SampleError> {
        let max_exponent = self.params.max_exponent(layer)?;
        let exponent = self.rng.gen_range(0..=max_exponent);
        let resolution = self.params.min_resolution * f64::powi(2.0, exponent as i32);

        let span = resolution * self.params.raster_size as f64;
        let origin_x = self.sample_origin(layer.bbox.min_x, layer.bbox.max_x - span);
        let origin_y = self.sample_origin(layer.bbox.min_y, layer.bbox.max_y - span);

        Ok(MapRequest {
            layer: layer.name.clone(),
            srs: layer.srs.clone(),
            bbox: BoundingBox::new(origin_x, origin_y, origin_x + span, origin_y + span),
            resolution,
            raster_size: self.params.raster_size,
            format: self.params.image_format.clone(),
        })
    }

    /// Weighted index selection from a cumulative distribution.
    pub fn pick_weighted(&mut self, cumulative: &[f64]) -> usize {
        let r: f64 = self.rng.gen();
        for (i, &cum) in cumulative.iter().enumerate() {
            if r <= cum {
                return i;
            }
        }
        cumulative.len().saturating_sub(1)
    }

    // The upper bound can dip below the lower at the coarsest ladder rung
    // from float rounding; clamp instead of handing the RNG an inverted
    // range.
    fn sample_origin(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            low
        } else {
            self.rng.gen_range(low..=high)
        }
    }
}

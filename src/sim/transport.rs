//! State shared by the photon and electron phases of a run.

use anyhow::Result;
use rand::Rng;

use crate::Point;
use crate::geom::bboxes::{expand_bbox, is_point_inside_bbox};
use crate::geom::crystal::CrystalGeometry;
use crate::physics::auger::AugerData;
use crate::physics::coefficients::{CoefficientProvider, ElementData, Medium};
use crate::physics::elastic::ElasticAngleTables;
use crate::sim::beam::Beam;
use crate::sim::config::SimulationConfig;
use crate::sim::dose::DoseAccumulator;
use crate::sim::particle::Electron;

/// Owns all mutable state of a run: geometry cache, data tables, dose and the
/// pending electron stack.
pub struct Transport<'p, P: CoefficientProvider> {
    pub(crate) provider: &'p P,
    pub(crate) config: SimulationConfig,
    pub(crate) beam: Beam,
    pub(crate) geometry: CrystalGeometry,
    pub(crate) auger: AugerData,
    pub(crate) elastic: ElasticAngleTables,
    pub(crate) dose: DoseAccumulator,
    /// Box outside of which particles are no longer followed.
    pub(crate) tracked_min: Point,
    pub(crate) tracked_max: Point,
    /// Photoelectron range at the beam energy (nm).
    pub(crate) photoelectron_range: f64,
    /// Electrons waiting to be transported.
    pub(crate) stack: Vec<Electron>,
}

impl<'p, P: CoefficientProvider> Transport<'p, P> {
    /// Creates the transport state and loads the Auger tables of every
    /// supported element in the crystal and surrounding compositions.
    pub fn new(
        provider: &'p P,
        config: SimulationConfig,
        beam: Beam,
        geometry: CrystalGeometry,
        elastic: ElasticAngleTables,
    ) -> Result<Self> {
        let mut auger = AugerData::new();
        let mut media = vec![Medium::Crystal];
        if provider.has_surrounding() {
            media.push(Medium::Surrounding);
        }
        for medium in media {
            for element in provider.elements(medium) {
                auger.load(elastic.locator(), element.atomic_number)?;
            }
        }
        log::debug!("Auger tables loaded for {} elements", auger.len());

        let range_medium = if provider.has_surrounding() {
            Medium::Surrounding
        } else {
            Medium::Crystal
        };
        let stopping = provider.stopping_power(beam.energy_kev, range_medium);
        let photoelectron_range = if stopping > 0.0 {
            beam.energy_kev / stopping
        } else {
            0.0
        };

        let (bbox_min, bbox_max) = geometry.bbox();
        let (tracked_min, tracked_max) = expand_bbox(bbox_min, bbox_max, photoelectron_range);
        let dose = DoseAccumulator::new(config.pulse_bin_length_fs, config.pulse_bins() + 1);

        Ok(Self {
            provider,
            config,
            beam,
            geometry,
            auger,
            elastic,
            dose,
            tracked_min,
            tracked_max,
            photoelectron_range,
            stack: Vec::new(),
        })
    }

    pub fn dose(&self) -> &DoseAccumulator {
        &self.dose
    }

    pub fn geometry(&self) -> &CrystalGeometry {
        &self.geometry
    }

    pub fn auger(&self) -> &AugerData {
        &self.auger
    }

    pub fn photoelectron_range(&self) -> f64 {
        self.photoelectron_range
    }

    pub fn into_parts(self) -> (DoseAccumulator, CrystalGeometry) {
        (self.dose, self.geometry)
    }

    /// Electrons are followed outside the crystal only when a surrounding
    /// medium exists and tracking is enabled.
    pub(crate) fn tracks_surrounding(&self) -> bool {
        self.config.track_surrounding_electrons && self.provider.has_surrounding()
    }

    pub(crate) fn in_tracked_region(&self, pos: Point) -> bool {
        is_point_inside_bbox(pos, self.tracked_min, self.tracked_max)
    }

    /// Medium at `pos` according to the voxel occupancy cache.
    pub(crate) fn medium_at(&mut self, pos: Point) -> Medium {
        if self.geometry.is_inside(pos) {
            Medium::Crystal
        } else {
            Medium::Surrounding
        }
    }

    /// Pushes an electron onto the stack and transports it together with every
    /// electron it spawns.
    pub fn transport_cascade<R: Rng + ?Sized>(
        &mut self,
        electron: Electron,
        rng: &mut R,
    ) -> Result<()> {
        self.stack.push(electron);
        while let Some(e) = self.stack.pop() {
            self.transport_electron(e, rng)?;
        }
        Ok(())
    }
}

/// Picks an element by walking the cumulative `weight` with one uniform draw.
///
/// Returns `None` when all weights are zero.
pub(crate) fn choose_element<'a, F>(
    elements: &'a [ElementData],
    u: f64,
    weight: F,
) -> Option<&'a ElementData>
where
    F: Fn(&ElementData) -> f64,
{
    let weights: Vec<f64> = elements.iter().map(|e| weight(e).max(0.0)).collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let target = u * total;
    let mut cumulative = 0.0;
    for (element, w) in elements.iter().zip(&weights) {
        cumulative += w;
        if target < cumulative {
            return Some(element);
        }
    }
    // Rounding at the top end
    elements
        .iter()
        .zip(&weights)
        .rev()
        .find(|(_, w)| **w > 0.0)
        .map(|(e, _)| e)
}

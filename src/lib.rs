pub mod geom;
pub mod io;
pub mod physics;
pub mod sim;

// Prelude
pub use geom::crystal::CrystalGeometry;
pub use geom::point::Point;
pub use geom::polyhedron::Polyhedron;
pub use geom::vector::Vector;
pub use physics::coefficients::{
    CoefficientProvider, ElementData, Medium, PhotonCoefficients, Shell,
};
pub use physics::tabulated::TabulatedCoefficients;
pub use sim::beam::{Beam, BeamShape};
pub use sim::config::{InelasticModel, SimulationConfig};
pub use sim::dose::DoseAccumulator;
pub use sim::report::DoseReport;
pub use sim::simulation::{Simulation, SimulationProgress, SimulationResult};

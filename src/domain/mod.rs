//! Domain types shared by the processors and the pipeline stages.

pub mod component;
pub mod section;

pub use component::{
    ComponentDescription, ComponentNode, ComponentRecord, ComponentTree, Content, Coordinates,
    FlatComponent, HeuristicElement, ImageAsset, LayoutInfo, MediaBundle, MediaCoordinates,
    MediaLayout, MediaRef, PercentOffsets, PixelCoordinates, Positioning, Styles, UnitOffsets,
    default_description,
};
pub use section::{CutLine, LineSource, Section};

//! Types related to the contents of layout [`Cell`]s.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use subgeom::bbox::{Bbox, BoundBox};
use subgeom::orientation::Orientation;
use subgeom::transform::{Transform, Transformation, Translate};
use subgeom::trim::Trim;
use subgeom::{Point, Rect, Shape};

use super::layers::LayerSpec;
use crate::deps::arcstr::ArcStr;

new_key_type! {
    /// A unique identifier for cells.
    pub struct CellKey;
}

/// A layout cell.
///
/// Child cells are referenced by [`CellKey`] and owned by the enclosing
/// [`Layout`](super::Layout).
#[derive(Debug, Default, Clone)]
pub struct Cell {
    /// The cell's name.
    name: ArcStr,
    /// A list of instances contained in the cell.
    insts: Vec<Instance>,
    /// A list of primitive/geometric elements.
    elems: Vec<Element>,
    /// A list of text annotations.
    annotations: Vec<TextElement>,
}

/// An instance of a cell in a layout.
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct Instance {
    /// A key to the referenced cell.
    pub(crate) cell: CellKey,
    /// The location of the cell.
    #[builder(default)]
    pub(crate) loc: Point,
    /// The orientation of the cell.
    #[builder(default)]
    pub(crate) orientation: Orientation,
    /// The magnification applied to the referenced cell.
    #[builder(default = "1.")]
    pub(crate) mag: f64,
}

/// A primitive geometric element.
///
/// Combines a geometric [`Shape`] with a [`LayerSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Element {
    /// The layer on which the element is located.
    pub layer: LayerSpec,
    /// The element's shape.
    pub inner: Shape,
}

impl Element {
    /// Creates a new [`Element`].
    pub fn new(layer: impl Into<LayerSpec>, shape: impl Into<Shape>) -> Self {
        Self {
            layer: layer.into(),
            inner: shape.into(),
        }
    }
}

impl BoundBox for Element {
    #[inline]
    fn bbox(&self) -> Bbox {
        self.inner.bbox()
    }
}

impl Transform for Element {
    fn transform(&self, trans: Transformation) -> Self {
        Self {
            layer: self.layer,
            inner: self.inner.transform(trans),
        }
    }
}

impl Translate for Element {
    fn translate(&mut self, p: Point) {
        self.inner.translate(p);
    }
}

impl Element {
    /// Clips the element to `bounds`.
    ///
    /// Paths straddling the boundary become one polygon per clipped segment.
    pub fn clip(&self, bounds: &Rect) -> Vec<Element> {
        self.inner
            .clip(bounds)
            .into_iter()
            .map(|inner| Element {
                layer: self.layer,
                inner,
            })
            .collect()
    }
}

/// A text annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextElement {
    /// The string value of the annotation.
    pub string: ArcStr,
    /// The location of the annotation.
    pub loc: Point,
    /// The layer on which the annotation resides.
    pub layer: LayerSpec,
}

impl TextElement {
    pub fn new(string: impl Into<ArcStr>, loc: Point, layer: impl Into<LayerSpec>) -> Self {
        Self {
            string: string.into(),
            loc,
            layer: layer.into(),
        }
    }
}

impl Trim<Rect> for TextElement {
    type Output = Self;
    fn trim(&self, bounds: &Rect) -> Option<Self::Output> {
        self.loc.trim(bounds).map(|_| self.clone())
    }
}

impl Translate for TextElement {
    fn translate(&mut self, p: Point) {
        self.loc.translate(p);
    }
}

impl Transform for TextElement {
    fn transform(&self, trans: Transformation) -> Self {
        Self {
            string: self.string.clone(),
            loc: self.loc.transform(trans),
            layer: self.layer,
        }
    }
}

impl Cell {
    /// Creates a new, empty [`Cell`].
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the name of the cell.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Sets the name of the cell.
    #[inline]
    pub fn set_name(&mut self, name: impl Into<ArcStr>) {
        self.name = name.into();
    }

    /// Returns an iterator over the instances in the cell.
    #[inline]
    pub fn insts(&self) -> impl Iterator<Item = &Instance> {
        self.insts.iter()
    }

    pub(crate) fn insts_mut(&mut self) -> &mut Vec<Instance> {
        &mut self.insts
    }

    /// Adds an instance to the cell.
    #[inline]
    pub fn add_inst(&mut self, inst: impl Into<Instance>) {
        self.insts.push(inst.into());
    }

    /// Adds several instances to the cell.
    pub fn add_insts(&mut self, insts: impl IntoIterator<Item = Instance>) {
        self.insts.extend(insts);
    }

    /// Returns an iterator over the geometric elements of the cell.
    #[inline]
    pub fn elems(&self) -> impl Iterator<Item = &Element> {
        self.elems.iter()
    }

    pub(crate) fn elems_mut(&mut self) -> &mut Vec<Element> {
        &mut self.elems
    }

    /// Adds a geometric element to the cell.
    #[inline]
    pub fn add_element(&mut self, elem: Element) {
        self.elems.push(elem);
    }

    /// Adds several geometric elements to the cell.
    pub fn add_elements(&mut self, elems: impl IntoIterator<Item = Element>) {
        self.elems.extend(elems);
    }

    /// Draws a rectangle on the given layer.
    pub fn draw_rect(&mut self, layer: impl Into<LayerSpec>, rect: Rect) {
        self.elems.push(Element::new(layer, rect));
    }

    /// Returns an iterator over the text annotations of the cell.
    #[inline]
    pub fn annotations(&self) -> impl Iterator<Item = &TextElement> {
        self.annotations.iter()
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut Vec<TextElement> {
        &mut self.annotations
    }

    /// Adds a text annotation to the cell.
    #[inline]
    pub fn add_annotation(&mut self, text_elem: TextElement) {
        self.annotations.push(text_elem);
    }

    /// Adds several text annotations to the cell.
    pub fn add_annotations(&mut self, annotations: impl IntoIterator<Item = TextElement>) {
        self.annotations.extend(annotations);
    }

    /// Returns `true` if the cell holds no instances, elements, or annotations.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty() && self.elems.is_empty() && self.annotations.is_empty()
    }

    /// Returns the bounding box of the cell's own elements, ignoring instances.
    pub fn local_bbox(&self) -> Bbox {
        self.elems
            .iter()
            .fold(Bbox::empty(), |bbox, elem| elem.inner.union(bbox))
    }
}

impl Instance {
    /// Creates a new [`Instance`] of `cell` at the origin.
    pub fn new(cell: CellKey) -> Self {
        Self {
            cell,
            loc: Point::zero(),
            orientation: Orientation::default(),
            mag: 1.,
        }
    }

    /// Creates a new [`Instance`] of `cell` at `loc`.
    pub fn at(cell: CellKey, loc: Point) -> Self {
        Self {
            loc,
            ..Self::new(cell)
        }
    }

    /// Creates a new [`InstanceBuilder`].
    #[inline]
    pub fn builder() -> InstanceBuilder {
        InstanceBuilder::default()
    }

    /// Returns the key of the instance's reference cell.
    #[inline]
    pub fn cell(&self) -> CellKey {
        self.cell
    }

    /// Points the instance at a different cell.
    #[inline]
    pub fn set_cell(&mut self, cell: CellKey) {
        self.cell = cell;
    }

    /// Returns the transformation associated with the instance.
    #[inline]
    pub fn transformation(&self) -> Transformation {
        Transformation::with_opts(self.loc, self.orientation, self.mag)
    }

    /// Returns the location of the instance.
    #[inline]
    pub fn loc(&self) -> Point {
        self.loc
    }

    /// Sets the location of the instance.
    #[inline]
    pub fn set_loc(&mut self, p: impl Into<Point>) {
        self.loc = p.into();
    }

    /// Returns the orientation of the instance.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Returns the magnification of the instance.
    #[inline]
    pub fn mag(&self) -> f64 {
        self.mag
    }
}

impl Translate for Instance {
    fn translate(&mut self, p: Point) {
        self.loc.translate(p);
    }
}

impl Transform for Instance {
    fn transform(&self, trans: Transformation) -> Self {
        let mut value = self.clone();
        let trans = Transformation::cascade(trans, self.transformation());
        value.orientation = trans.orientation();
        value.mag = trans.mag();
        value.loc = trans.offset_point();
        value
    }
}

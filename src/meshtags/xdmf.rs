//! XDMF attribute records describing the datasets written for a named entity group.

use std::fmt::{self, Write};

use super::ElementType;

/// Where an attribute lives on the grid it is attached to.
///
/// A tag set is its own sub-grid whose cells are the tagged entities, so its values
/// are always `Cell` centered whatever the entity dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Center {
    Node,
    Edge,
    Face,
    Cell,
}

impl Center {
    pub fn as_str(&self) -> &'static str {
        match self {
            Center::Node => "Node",
            Center::Edge => "Edge",
            Center::Face => "Face",
            Center::Cell => "Cell",
        }
    }
}

impl fmt::Display for Center {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Scalar,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Scalar => f.write_str("Scalar"),
        }
    }
}

/// Reference to a dataset in the parallel store, and where this rank wrote into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub path: String,
    /// first row written by this rank
    pub offset: usize,
    pub shape: [usize; 2],
    pub element_type: ElementType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub name: String,
    pub attribute_type: AttributeType,
    pub center: Center,
    pub data_item: DataItem,
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl AttributeRecord {
    /// `<Attribute>` node with an HDF `DataItem` pointing at `data_file:path`
    pub fn to_xml(&self, data_file: &str, indent: &str) -> String {
        let item = &self.data_item;
        let mut xml = String::new();
        // writing into a String cannot fail
        let _ = writeln!(
            xml,
            "{indent}<Attribute Name=\"{}\" AttributeType=\"{}\" Center=\"{}\">",
            escape(&self.name),
            self.attribute_type,
            self.center
        );
        let _ = writeln!(
            xml,
            "{indent}  <DataItem Dimensions=\"{} {}\" NumberType=\"{}\" Precision=\"{}\" Format=\"HDF\">",
            item.shape[0],
            item.shape[1],
            item.element_type.number_type(),
            item.element_type.size()
        );
        let _ = writeln!(xml, "{indent}    {}:{}", escape(data_file), escape(&item.path));
        let _ = writeln!(xml, "{indent}  </DataItem>");
        let _ = writeln!(xml, "{indent}</Attribute>");
        xml
    }
}

/// The grid node that attribute records are appended to
#[derive(Debug, Clone, Default)]
pub struct XdmfGrid {
    name: String,
    data_file: String,
    attributes: Vec<AttributeRecord>,
}

impl XdmfGrid {
    pub fn new<N: Into<String>, F: Into<String>>(name: N, data_file: F) -> Self {
        Self {
            name: name.into(),
            data_file: data_file.into(),
            attributes: Vec::new(),
        }
    }

    pub fn push(&mut self, attribute: AttributeRecord) {
        self.attributes.push(attribute);
    }

    pub fn attributes(&self) -> &[AttributeRecord] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRecord> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        let _ = writeln!(
            xml,
            "<Grid Name=\"{}\" GridType=\"Uniform\">",
            escape(&self.name)
        );
        for attribute in &self.attributes {
            xml.push_str(&attribute.to_xml(&self.data_file, "  "));
        }
        xml.push_str("</Grid>\n");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, center: Center) -> AttributeRecord {
        AttributeRecord {
            name: name.to_string(),
            attribute_type: AttributeType::Scalar,
            center,
            data_item: DataItem {
                path: format!("/MeshTags/{}/Values", name),
                offset: 4,
                shape: [10, 1],
                element_type: ElementType::Int32,
            },
        }
    }

    #[test]
    fn test_attribute_xml() {
        let xml = record("material", Center::Cell).to_xml("mesh.h5", "");
        assert!(xml.starts_with(
            "<Attribute Name=\"material\" AttributeType=\"Scalar\" Center=\"Cell\">"
        ));
        assert!(xml.contains(
            "<DataItem Dimensions=\"10 1\" NumberType=\"Int\" Precision=\"4\" Format=\"HDF\">"
        ));
        assert!(xml.contains("mesh.h5:/MeshTags/material/Values"));
        assert!(xml.trim_end().ends_with("</Attribute>"));
    }

    #[test]
    fn test_grid_xml() {
        let mut grid = XdmfGrid::new("mesh", "mesh.h5");
        grid.push(record("a", Center::Cell));
        grid.push(record("b<1>", Center::Node));

        assert_eq!(grid.attributes().len(), 2);
        assert_eq!(grid.attribute("a").unwrap().center, Center::Cell);
        assert!(grid.attribute("c").is_none());

        let xml = grid.to_xml();
        assert!(xml.starts_with("<Grid Name=\"mesh\" GridType=\"Uniform\">"));
        assert!(xml.contains("Name=\"b&lt;1&gt;\""));
        assert_eq!(xml.matches("<Attribute ").count(), 2);
        assert!(xml.ends_with("</Grid>\n"));
    }
}

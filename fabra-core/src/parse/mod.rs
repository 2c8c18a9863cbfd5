//! Routing graph file loading.
//!
//! Reads the `<rr_graph>` XML dump (VPR flavour) with an event-driven
//! `quick-xml` pass: channels, switches, nodes, edges, block types, and
//! grid, in any order. The simple flavour carries nodes, switches, and
//! edges only and produces a graph without an architecture or lookup.
//! Unrecognised elements and attributes are ignored; missing required
//! pieces are fatal.

mod error;

pub use self::error::{ParseError, ParseErrorCode};

use std::{fs::File, io::BufReader, path::Path, str::FromStr};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use tracing::info;

use crate::{
    graph::{
        Architecture, BlockType, ChannelWidths, Direction, EdgeRef, GridTile, NodeType, PinClass,
        PinType, RoutingGraph, RrNode, Side, Switch,
    },
    options::GraphMode,
};

use self::error::Result;

type XmlReader = Reader<BufReader<File>>;

/// A parsed routing graph and, for VPR-mode files, its architecture.
#[derive(Clone, Debug)]
pub struct ParsedGraph {
    /// The assembled graph store with reverse edges, weights, and (in VPR
    /// mode) a verified lookup.
    pub graph: RoutingGraph,
    /// Block types, grid, and channel widths; absent for simple graphs.
    pub architecture: Option<Architecture>,
}

/// Parses the routing graph file at `path` according to `mode`.
///
/// # Errors
/// Returns [`ParseError`] for I/O failures, malformed XML, missing
/// required elements or attributes, duplicate or undefined node ids,
/// dangling edge references, and graph/lookup consistency failures.
pub fn parse_rr_graph_file(path: &Path, mode: GraphMode) -> Result<ParsedGraph> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("xml") {
        return Err(ParseError::NotXml {
            path: path.to_path_buf(),
        });
    }
    info!(path = %path.display(), mode = mode.as_str(), "parsing routing graph");

    let file = File::open(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = Reader::from_reader(BufReader::new(file));

    let mut collected = Collected::default();
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| xml_error(&err))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"rr_graph" => {}
                b"channels" => collected.channels(&mut reader)?,
                b"switches" => collected.switches(&mut reader)?,
                b"rr_nodes" => collected.nodes(&mut reader)?,
                b"rr_edges" => collected.edges(&mut reader)?,
                b"block_types" => collected.blocks(&mut reader)?,
                b"grid" => collected.grid(&mut reader)?,
                _ => skip_subtree(&mut reader, &e)?,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    collected.assemble(mode)
}

fn xml_error(err: &impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        message: err.to_string(),
    }
}

/// Skips everything up to the end tag matching `start`.
fn skip_subtree(reader: &mut XmlReader, start: &BytesStart<'_>) -> Result<()> {
    let end = start.to_end().into_owned();
    let mut buf = Vec::new();
    reader
        .read_to_end_into(end.name(), &mut buf)
        .map_err(|err| xml_error(&err))?;
    Ok(())
}

/// Attributes of one element, unescaped up front.
struct Attrs {
    element: &'static str,
    values: Vec<(String, String)>,
}

impl Attrs {
    fn collect(e: &BytesStart<'_>, element: &'static str) -> Result<Self> {
        let mut values = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| xml_error(&err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error(&err))?
                .into_owned();
            values.push((key, value));
        }
        Ok(Self { element, values })
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, name: &'static str) -> Result<&str> {
        self.get(name).ok_or(ParseError::MissingAttribute {
            element: self.element,
            attribute: name,
        })
    }

    fn number<T: FromStr>(&self, name: &'static str) -> Result<T> {
        let raw = self.required(name)?;
        parse_number(raw, self.element, name)
    }

    fn number_or<T: FromStr + Default>(&self, name: &'static str) -> Result<T> {
        match self.get(name) {
            Some(raw) => parse_number(raw, self.element, name),
            None => Ok(T::default()),
        }
    }
}

/// Parses a numeric attribute, tolerating float-formatted integers the
/// way VPR emits them (`"2.0"` for a coordinate).
fn parse_number<T: FromStr>(raw: &str, element: &'static str, attribute: &'static str) -> Result<T> {
    if let Ok(value) = raw.parse::<T>() {
        return Ok(value);
    }
    if let Ok(float) = raw.parse::<f64>() {
        let rounded = format!("{}", float as i64);
        if let Ok(value) = rounded.parse::<T>() {
            return Ok(value);
        }
    }
    Err(ParseError::InvalidAttribute {
        element,
        attribute,
        value: raw.to_owned(),
    })
}

#[derive(Default)]
struct Collected {
    chan: Option<ChannelWidths>,
    switches: Vec<Option<Switch>>,
    nodes: Vec<Option<RrNode>>,
    edges: Vec<(usize, usize, usize)>,
    blocks: Vec<Option<BlockType>>,
    grid_entries: Option<Vec<(u16, u16, usize, u16, u16)>>,
}

impl Collected {
    fn channels(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut chan = ChannelWidths::default();
        let mut buf = Vec::new();
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"channel" => {
                        let attrs = Attrs::collect(&e, "channel")?;
                        chan.max = attrs.number("chan_width_max")?;
                        chan.x_min = attrs.number("x_min")?;
                        chan.x_max = attrs.number("x_max")?;
                        chan.y_min = attrs.number("y_min")?;
                        chan.y_max = attrs.number("y_max")?;
                    }
                    b"x_list" => {
                        push_list_entry(&Attrs::collect(&e, "x_list")?, &mut chan.x_list)?;
                    }
                    b"y_list" => {
                        push_list_entry(&Attrs::collect(&e, "y_list")?, &mut chan.y_list)?;
                    }
                    _ => {}
                },
                Event::End(e) if e.name().as_ref() == b"channels" => break,
                Event::Eof => {
                    return Err(ParseError::MissingElement {
                        element: "channels",
                    });
                }
                _ => {}
            }
            buf.clear();
        }
        self.chan = Some(chan);
        Ok(())
    }

    fn switches(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut buf = Vec::new();
        let mut current: Option<(usize, Switch)> = None;
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            let is_empty = matches!(event, Event::Empty(_));
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"switch" => {
                        let attrs = Attrs::collect(&e, "switch")?;
                        let id: usize = attrs.number("id")?;
                        let kind = attrs.required("type")?;
                        let switch = Switch {
                            buffered: matches!(kind, "mux" | "tristate" | "buffer"),
                            ..Switch::default()
                        };
                        current = Some((id, switch));
                        if is_empty {
                            self.store_switch(current.take());
                        }
                    }
                    b"timing" => {
                        if let Some((_, switch)) = current.as_mut() {
                            let attrs = Attrs::collect(&e, "timing")?;
                            switch.r = attrs.number_or("R")?;
                            switch.cin = attrs.number_or("Cin")?;
                            switch.cout = attrs.number_or("Cout")?;
                            switch.tdel = attrs.number_or("Tdel")?;
                        }
                    }
                    b"sizing" => {
                        if let Some((_, switch)) = current.as_mut() {
                            let attrs = Attrs::collect(&e, "sizing")?;
                            switch.mux_trans_size = attrs.number_or("mux_trans_size")?;
                            switch.buf_size = attrs.number_or("buf_size")?;
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"switch" => self.store_switch(current.take()),
                    b"switches" => break,
                    _ => {}
                },
                Event::Eof => {
                    return Err(ParseError::MissingElement {
                        element: "switches",
                    });
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn store_switch(&mut self, entry: Option<(usize, Switch)>) {
        if let Some((id, switch)) = entry {
            if self.switches.len() <= id {
                self.switches.resize(id + 1, None);
            }
            self.switches[id] = Some(switch);
        }
    }

    fn nodes(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut buf = Vec::new();
        let mut current: Option<NodeDraft> = None;
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"node" => {
                        let attrs = Attrs::collect(&e, "node")?;
                        current = Some(NodeDraft::from_attrs(&attrs)?);
                    }
                    b"loc" => {
                        if let Some(draft) = current.as_mut() {
                            draft.read_loc(&Attrs::collect(&e, "loc")?)?;
                        }
                    }
                    b"timing" => {
                        if let Some(draft) = current.as_mut() {
                            let attrs = Attrs::collect(&e, "timing")?;
                            draft.r = attrs.number_or("R")?;
                            draft.c = attrs.number_or("C")?;
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"node" => {
                        if let Some(draft) = current.take() {
                            self.store_node(draft)?;
                        }
                    }
                    b"rr_nodes" => break,
                    _ => {}
                },
                Event::Eof => {
                    return Err(ParseError::MissingElement {
                        element: "rr_nodes",
                    });
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn store_node(&mut self, draft: NodeDraft) -> Result<()> {
        let (id, node) = draft.build()?;
        if self.nodes.len() <= id {
            self.nodes.resize_with(id + 1, || None);
        }
        if self.nodes[id].is_some() {
            return Err(ParseError::DuplicateNode { id });
        }
        self.nodes[id] = Some(node);
        Ok(())
    }

    fn edges(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            match event {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"edge" => {
                    let attrs = Attrs::collect(&e, "edge")?;
                    let src: usize = attrs.number("src_node")?;
                    let sink: usize = attrs.number("sink_node")?;
                    let switch: usize = attrs.number("switch_id")?;
                    self.edges.push((src, sink, switch));
                }
                Event::End(e) if e.name().as_ref() == b"rr_edges" => break,
                Event::Eof => {
                    return Err(ParseError::MissingElement {
                        element: "rr_edges",
                    });
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn blocks(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut buf = Vec::new();
        let mut current: Option<BlockDraft> = None;
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"block_type" => {
                        let attrs = Attrs::collect(&e, "block_type")?;
                        current = Some(BlockDraft {
                            id: attrs.number("id")?,
                            name: attrs.required("name")?.to_owned(),
                            width: attrs.number("width")?,
                            height: attrs.number("height")?,
                            classes: Vec::new(),
                        });
                    }
                    b"pin_class" => {
                        if let Some(draft) = current.as_mut() {
                            let attrs = Attrs::collect(&e, "pin_class")?;
                            let pin_type = match attrs.required("type")? {
                                "OUTPUT" => PinType::Driver,
                                "INPUT" => PinType::Receiver,
                                "OPEN" => PinType::Open,
                                other => {
                                    return Err(ParseError::InvalidAttribute {
                                        element: "pin_class",
                                        attribute: "type",
                                        value: other.to_owned(),
                                    });
                                }
                            };
                            draft.classes.push((pin_type, Vec::new(), Vec::new()));
                        }
                    }
                    b"pin" => {
                        if let Some((_, pins, globals)) =
                            current.as_mut().and_then(|d| d.classes.last_mut())
                        {
                            let attrs = Attrs::collect(&e, "pin")?;
                            let ptc: u16 = attrs.number("ptc")?;
                            pins.push(ptc);
                            if attrs.get("is_global") == Some("true")
                                || attrs.get("is_global") == Some("1")
                            {
                                globals.push(ptc);
                            }
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"block_type" => {
                        if let Some(draft) = current.take() {
                            self.store_block(draft)?;
                        }
                    }
                    b"block_types" => break,
                    _ => {}
                },
                Event::Eof => {
                    return Err(ParseError::MissingElement {
                        element: "block_types",
                    });
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn store_block(&mut self, draft: BlockDraft) -> Result<()> {
        let mut block = BlockType::new(draft.name, draft.id, draft.width, draft.height);
        let num_pins = draft
            .classes
            .iter()
            .flat_map(|(_, pins, _)| pins.iter())
            .map(|&pin| usize::from(pin) + 1)
            .max()
            .unwrap_or(0);
        block.reserve_pins(num_pins);
        for (pin_type, pins, globals) in draft.classes {
            block
                .push_class(PinClass { pin_type, pins }, &globals)
                .map_err(ParseError::Graph)?;
        }
        if self.blocks.len() <= draft.id {
            self.blocks.resize_with(draft.id + 1, || None);
        }
        self.blocks[draft.id] = Some(block);
        Ok(())
    }

    fn grid(&mut self, reader: &mut XmlReader) -> Result<()> {
        let mut buf = Vec::new();
        let mut entries = self.grid_entries.take().unwrap_or_default();
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|err| xml_error(&err))?;
            match event {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"grid_loc" => {
                    let attrs = Attrs::collect(&e, "grid_loc")?;
                    entries.push((
                        attrs.number("x")?,
                        attrs.number("y")?,
                        attrs.number("block_type_id")?,
                        attrs.number_or("width_offset")?,
                        attrs.number_or("height_offset")?,
                    ));
                }
                Event::End(e) if e.name().as_ref() == b"grid" => break,
                Event::Eof => {
                    return Err(ParseError::MissingElement { element: "grid" });
                }
                _ => {}
            }
            buf.clear();
        }
        self.grid_entries = Some(entries);
        Ok(())
    }

    fn assemble(self, mode: GraphMode) -> Result<ParsedGraph> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (id, node) in self.nodes.into_iter().enumerate() {
            nodes.push(node.ok_or(ParseError::MissingNode { id })?);
        }
        let switches: Vec<Switch> = self
            .switches
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        for &(src, sink, switch) in &self.edges {
            let num_nodes = nodes.len();
            if src >= num_nodes {
                return Err(ParseError::UnknownNodeId {
                    id: src,
                    num_nodes,
                });
            }
            if sink >= num_nodes {
                return Err(ParseError::UnknownNodeId {
                    id: sink,
                    num_nodes,
                });
            }
            nodes[src].push_out_edge(EdgeRef {
                node: sink,
                switch,
            });
        }

        let mut graph = RoutingGraph::new(nodes, switches).map_err(ParseError::Graph)?;
        info!(
            nodes = graph.num_nodes(),
            switches = graph.num_switches(),
            "routing graph loaded"
        );

        if mode == GraphMode::Simple {
            return Ok(ParsedGraph {
                graph,
                architecture: None,
            });
        }

        let chan = self
            .chan
            .ok_or(ParseError::MissingElement { element: "channels" })?;
        let grid_entries = self
            .grid_entries
            .ok_or(ParseError::MissingElement { element: "grid" })?;
        if self.blocks.is_empty() {
            return Err(ParseError::MissingElement {
                element: "block_types",
            });
        }
        let blocks: Vec<BlockType> = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(id, block)| block.unwrap_or_else(|| BlockType::new(String::new(), id, 1, 1)))
            .collect();

        let (mut width, mut height) = (0u16, 0u16);
        for &(x, y, ..) in &grid_entries {
            width = width.max(x + 1);
            height = height.max(y + 1);
        }
        let mut grid = vec![vec![GridTile::default(); usize::from(height)]; usize::from(width)];
        for (x, y, type_index, width_offset, height_offset) in grid_entries {
            grid[usize::from(x)][usize::from(y)] = GridTile {
                type_index,
                width_offset,
                height_offset,
                num_sources: 0,
                num_receivers: 0,
            };
        }

        let arch = Architecture::new(blocks, grid, chan).map_err(ParseError::Graph)?;
        graph.build_lookup(&arch).map_err(ParseError::Graph)?;
        Ok(ParsedGraph {
            graph,
            architecture: Some(arch),
        })
    }
}

fn push_list_entry(attrs: &Attrs, list: &mut Vec<usize>) -> Result<()> {
    let index: usize = attrs.number("index")?;
    let info: usize = attrs.number("info")?;
    if list.len() <= index {
        list.resize(index + 1, 0);
    }
    list[index] = info;
    Ok(())
}

struct NodeDraft {
    id: usize,
    node_type: NodeType,
    direction: Direction,
    loc: Option<(u16, u16, u16, u16, u16, Option<Side>)>,
    r: f32,
    c: f32,
}

impl NodeDraft {
    fn from_attrs(attrs: &Attrs) -> Result<Self> {
        let id: usize = attrs.number("id")?;
        let node_type = match attrs.required("type")? {
            "SOURCE" => NodeType::Source,
            "SINK" => NodeType::Sink,
            "IPIN" => NodeType::Ipin,
            "OPIN" => NodeType::Opin,
            "CHANX" => NodeType::Chanx,
            "CHANY" => NodeType::Chany,
            other => {
                return Err(ParseError::InvalidAttribute {
                    element: "node",
                    attribute: "type",
                    value: other.to_owned(),
                });
            }
        };
        let direction = if node_type.is_wire() {
            match attrs.required("direction")? {
                "INC_DIR" => Direction::Inc,
                "DEC_DIR" => Direction::Dec,
                "BI_DIR" => Direction::Bi,
                "NO_DIR" => Direction::None,
                other => {
                    return Err(ParseError::InvalidAttribute {
                        element: "node",
                        attribute: "direction",
                        value: other.to_owned(),
                    });
                }
            }
        } else {
            Direction::None
        };
        Ok(Self {
            id,
            node_type,
            direction,
            loc: None,
            r: 0.0,
            c: 0.0,
        })
    }

    fn read_loc(&mut self, attrs: &Attrs) -> Result<()> {
        let side = if self.node_type.is_pin() {
            Some(match attrs.required("side")? {
                "TOP" => Side::Top,
                "RIGHT" => Side::Right,
                "BOTTOM" => Side::Bottom,
                "LEFT" => Side::Left,
                other => {
                    return Err(ParseError::InvalidAttribute {
                        element: "loc",
                        attribute: "side",
                        value: other.to_owned(),
                    });
                }
            })
        } else {
            None
        };
        self.loc = Some((
            attrs.number("xlow")?,
            attrs.number("ylow")?,
            attrs.number("xhigh")?,
            attrs.number("yhigh")?,
            attrs.number("ptc")?,
            side,
        ));
        Ok(())
    }

    fn build(self) -> Result<(usize, RrNode)> {
        let (xlow, ylow, xhigh, yhigh, ptc, side) =
            self.loc.ok_or(ParseError::MissingElement { element: "loc" })?;
        let mut node = RrNode::new(self.node_type, ptc);
        node.set_coordinates(xlow, ylow, xhigh, yhigh);
        node.set_direction(self.direction);
        node.set_timing(self.r, self.c);
        if let Some(side) = side {
            node.set_side(side);
        }
        Ok((self.id, node))
    }
}

struct BlockDraft {
    id: usize,
    name: String,
    width: u16,
    height: u16,
    /// `(type, pins, global pins)` per class, in document order.
    classes: Vec<(PinType, Vec<u16>, Vec<u16>)>,
}

#[cfg(test)]
mod tests;

//! Opcode metadata: name, store/branch/text layout, arity and the story
//! versions each opcode exists in.
//!
//! An opcode is identified by the table it lives in (0OP, 1OP, 2OP, VAR or
//! EXT) plus its number. A few numbers mean different things before and
//! after a given version (0OP:9 is `pop` then `catch`, 1OP:15 is `not` then
//! `call_1n`, 0OP:5 branches in V1-3 but stores in V4), so each key maps to
//! a list of version-ranged entries.

use indexmap::IndexMap;
use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeTable {
    Op0,
    Op1,
    Op2,
    Var,
    Ext,
}

impl OpcodeTable {
    pub fn label(&self) -> &'static str {
        match self {
            OpcodeTable::Op0 => "0OP",
            OpcodeTable::Op1 => "1OP",
            OpcodeTable::Op2 => "2OP",
            OpcodeTable::Var => "VAR",
            OpcodeTable::Ext => "EXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub stores: bool,
    pub branches: bool,
    /// Followed by an inline Z-string
    pub text: bool,
    pub min_operands: usize,
    pub min_version: u8,
    pub max_version: u8,
}

const fn op(name: &'static str, min_operands: usize) -> OpcodeInfo {
    OpcodeInfo {
        name,
        stores: false,
        branches: false,
        text: false,
        min_operands,
        min_version: 1,
        max_version: 8,
    }
}

impl OpcodeInfo {
    const fn store(mut self) -> Self {
        self.stores = true;
        self
    }

    const fn branch(mut self) -> Self {
        self.branches = true;
        self
    }

    const fn text(mut self) -> Self {
        self.text = true;
        self
    }

    const fn versions(mut self, min: u8, max: u8) -> Self {
        self.min_version = min;
        self.max_version = max;
        self
    }

    const fn since(self, min: u8) -> Self {
        self.versions(min, 8)
    }
}

lazy_static! {
    static ref OPCODES: IndexMap<(OpcodeTable, u8), Vec<OpcodeInfo>> = build_table();
}

fn build_table() -> IndexMap<(OpcodeTable, u8), Vec<OpcodeInfo>> {
    use OpcodeTable::*;
    let entries: Vec<(OpcodeTable, u8, OpcodeInfo)> = vec![
        (Op0, 0x00, op("rtrue", 0)),
        (Op0, 0x01, op("rfalse", 0)),
        (Op0, 0x02, op("print", 0).text()),
        (Op0, 0x03, op("print_ret", 0).text()),
        (Op0, 0x04, op("nop", 0)),
        (Op0, 0x05, op("save", 0).branch().versions(1, 3)),
        (Op0, 0x05, op("save", 0).store().versions(4, 4)),
        (Op0, 0x06, op("restore", 0).branch().versions(1, 3)),
        (Op0, 0x06, op("restore", 0).store().versions(4, 4)),
        (Op0, 0x07, op("restart", 0)),
        (Op0, 0x08, op("ret_popped", 0)),
        (Op0, 0x09, op("pop", 0).versions(1, 4)),
        (Op0, 0x09, op("catch", 0).store().since(5)),
        (Op0, 0x0A, op("quit", 0)),
        (Op0, 0x0B, op("new_line", 0)),
        (Op0, 0x0C, op("show_status", 0)),
        (Op0, 0x0D, op("verify", 0).branch().since(3)),
        (Op0, 0x0F, op("piracy", 0).branch().since(5)),
        (Op1, 0x00, op("jz", 1).branch()),
        (Op1, 0x01, op("get_sibling", 1).store().branch()),
        (Op1, 0x02, op("get_child", 1).store().branch()),
        (Op1, 0x03, op("get_parent", 1).store()),
        (Op1, 0x04, op("get_prop_len", 1).store()),
        (Op1, 0x05, op("inc", 1)),
        (Op1, 0x06, op("dec", 1)),
        (Op1, 0x07, op("print_addr", 1)),
        (Op1, 0x08, op("call_1s", 1).store().since(4)),
        (Op1, 0x09, op("remove_obj", 1)),
        (Op1, 0x0A, op("print_obj", 1)),
        (Op1, 0x0B, op("ret", 1)),
        (Op1, 0x0C, op("jump", 1)),
        (Op1, 0x0D, op("print_paddr", 1)),
        (Op1, 0x0E, op("load", 1).store()),
        (Op1, 0x0F, op("not", 1).store().versions(1, 4)),
        (Op1, 0x0F, op("call_1n", 1).since(5)),
        (Op2, 0x01, op("je", 2).branch()),
        (Op2, 0x02, op("jl", 2).branch()),
        (Op2, 0x03, op("jg", 2).branch()),
        (Op2, 0x04, op("dec_chk", 2).branch()),
        (Op2, 0x05, op("inc_chk", 2).branch()),
        (Op2, 0x06, op("jin", 2).branch()),
        (Op2, 0x07, op("test", 2).branch()),
        (Op2, 0x08, op("or", 2).store()),
        (Op2, 0x09, op("and", 2).store()),
        (Op2, 0x0A, op("test_attr", 2).branch()),
        (Op2, 0x0B, op("set_attr", 2)),
        (Op2, 0x0C, op("clear_attr", 2)),
        (Op2, 0x0D, op("store", 2)),
        (Op2, 0x0E, op("insert_obj", 2)),
        (Op2, 0x0F, op("loadw", 2).store()),
        (Op2, 0x10, op("loadb", 2).store()),
        (Op2, 0x11, op("get_prop", 2).store()),
        (Op2, 0x12, op("get_prop_addr", 2).store()),
        (Op2, 0x13, op("get_next_prop", 2).store()),
        (Op2, 0x14, op("add", 2).store()),
        (Op2, 0x15, op("sub", 2).store()),
        (Op2, 0x16, op("mul", 2).store()),
        (Op2, 0x17, op("div", 2).store()),
        (Op2, 0x18, op("mod", 2).store()),
        (Op2, 0x19, op("call_2s", 2).store().since(4)),
        (Op2, 0x1A, op("call_2n", 2).since(5)),
        (Op2, 0x1B, op("set_colour", 2).since(5)),
        (Op2, 0x1C, op("throw", 2).since(5)),
        (Var, 0x00, op("call", 1).store().versions(1, 3)),
        (Var, 0x00, op("call_vs", 1).store().since(4)),
        (Var, 0x01, op("storew", 3)),
        (Var, 0x02, op("storeb", 3)),
        (Var, 0x03, op("put_prop", 3)),
        (Var, 0x04, op("sread", 1).versions(1, 4)),
        (Var, 0x04, op("aread", 1).store().since(5)),
        (Var, 0x05, op("print_char", 1)),
        (Var, 0x06, op("print_num", 1)),
        (Var, 0x07, op("random", 1).store()),
        (Var, 0x08, op("push", 1)),
        (Var, 0x09, op("pull", 1).versions(1, 5)),
        (Var, 0x09, op("pull", 0).store().versions(6, 6)),
        (Var, 0x09, op("pull", 1).versions(7, 8)),
        (Var, 0x0A, op("split_window", 1).since(3)),
        (Var, 0x0B, op("set_window", 1).since(3)),
        (Var, 0x0C, op("call_vs2", 1).store().since(4)),
        (Var, 0x0D, op("erase_window", 1).since(4)),
        (Var, 0x0E, op("erase_line", 1).since(4)),
        (Var, 0x0F, op("set_cursor", 1).since(4)),
        (Var, 0x10, op("get_cursor", 1).since(4)),
        (Var, 0x11, op("set_text_style", 1).since(4)),
        (Var, 0x12, op("buffer_mode", 1).since(4)),
        (Var, 0x13, op("output_stream", 1).since(3)),
        (Var, 0x14, op("input_stream", 1).since(3)),
        (Var, 0x15, op("sound_effect", 0).since(3)),
        (Var, 0x16, op("read_char", 1).store().since(4)),
        (Var, 0x17, op("scan_table", 3).store().branch().since(4)),
        (Var, 0x18, op("not", 1).store().since(5)),
        (Var, 0x19, op("call_vn", 1).since(5)),
        (Var, 0x1A, op("call_vn2", 1).since(5)),
        (Var, 0x1B, op("tokenise", 2).since(5)),
        (Var, 0x1C, op("encode_text", 4).since(5)),
        (Var, 0x1D, op("copy_table", 3).since(5)),
        (Var, 0x1E, op("print_table", 2).since(5)),
        (Var, 0x1F, op("check_arg_count", 1).branch().since(5)),
        (Ext, 0x00, op("save", 0).store().since(5)),
        (Ext, 0x01, op("restore", 0).store().since(5)),
        (Ext, 0x02, op("log_shift", 2).store().since(5)),
        (Ext, 0x03, op("art_shift", 2).store().since(5)),
        (Ext, 0x04, op("set_font", 1).store().since(5)),
        (Ext, 0x05, op("draw_picture", 1).versions(6, 6)),
        (Ext, 0x06, op("picture_data", 2).branch().versions(6, 6)),
        (Ext, 0x07, op("erase_picture", 1).versions(6, 6)),
        (Ext, 0x08, op("set_margins", 2).versions(6, 6)),
        (Ext, 0x09, op("save_undo", 0).store().since(5)),
        (Ext, 0x0A, op("restore_undo", 0).store().since(5)),
        (Ext, 0x0B, op("print_unicode", 1).since(5)),
        (Ext, 0x0C, op("check_unicode", 1).store().since(5)),
        (Ext, 0x0D, op("set_true_colour", 2).since(5)),
        (Ext, 0x10, op("move_window", 3).versions(6, 6)),
        (Ext, 0x11, op("window_size", 3).versions(6, 6)),
        (Ext, 0x12, op("window_style", 2).versions(6, 6)),
        (Ext, 0x13, op("get_wind_prop", 2).store().versions(6, 6)),
        (Ext, 0x14, op("scroll_window", 2).versions(6, 6)),
        (Ext, 0x15, op("pop_stack", 1).versions(6, 6)),
        (Ext, 0x16, op("read_mouse", 1).versions(6, 6)),
        (Ext, 0x17, op("mouse_window", 1).versions(6, 6)),
        (Ext, 0x18, op("push_stack", 2).branch().versions(6, 6)),
        (Ext, 0x19, op("put_wind_prop", 3).versions(6, 6)),
        (Ext, 0x1A, op("print_form", 1).versions(6, 6)),
        (Ext, 0x1B, op("make_menu", 2).branch().versions(6, 6)),
        (Ext, 0x1C, op("picture_table", 1).versions(6, 6)),
    ];

    let mut table: IndexMap<(OpcodeTable, u8), Vec<OpcodeInfo>> = IndexMap::new();
    for (kind, number, info) in entries {
        table.entry((kind, number)).or_default().push(info);
    }
    table
}

/// Look up an opcode for a story version; `None` means the combination does not exist
pub fn lookup(table: OpcodeTable, opcode: u8, version: u8) -> Option<OpcodeInfo> {
    OPCODES.get(&(table, opcode)).and_then(|variants| {
        variants
            .iter()
            .find(|info| (info.min_version..=info.max_version).contains(&version))
            .copied()
    })
}

/// Every opcode valid in `version`, in table order
pub fn opcodes_for_version(version: u8) -> Vec<(OpcodeTable, u8, OpcodeInfo)> {
    OPCODES
        .iter()
        .filter_map(|(&(table, number), _)| {
            lookup(table, number, version).map(|info| (table, number, info))
        })
        .collect()
}

/**********************************************
  > File Name		: trace.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Thu Apr  8 09:12:40 2021
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Structured trace of tree operations, meant to feed a visualiser.
 * A sink is attached to an IndexHandle and sees every insert, every
 * node visited by a descent and the children of nodes that split.
 *
 * Tracing never changes the tree and never fails an operation:
 * a sink that cannot write just logs the failure.
 */

use std::io::Write;

use log::warn;

use super::Key;
use crate::page_management::PageId;
use crate::record_management::RID;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Insert {
        key: Key,
        rid: RID,
    },
    Visit {
        page: PageId,
    },
    IndexChildren {
        page: PageId,
        left_link: PageId,
        children: Vec<PageId>,
    },
    LeafChildren {
        page: PageId,
        entries: Vec<(Key, RID)>,
    },
}

pub trait TraceSink {
    fn event(&mut self, event: &TraceEvent);
}

/// Collects events in memory.
impl TraceSink for Vec<TraceEvent> {
    fn event(&mut self, event: &TraceEvent) {
        self.push(event.clone());
    }
}

/*
 * Renders events in the line format of the visualiser:
 *
 *     INSERT <page> <slot> <key>
 *     DO
 *     VISIT node <page>
 *     INDEX CHILDREN <page> nodes
 *      <left link>   <child>   <child>
 *     LEAF CHILDREN <page> nodes
 *        <key> [<page>,<slot>]   <key> [<page>,<slot>]
 */
pub struct WriterTrace<W: Write> {
    out: W,
}

impl<W: Write> WriterTrace<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, event: &TraceEvent) -> std::io::Result<()> {
        match event {
            TraceEvent::Insert { key, rid } => {
                writeln!(
                    self.out,
                    "INSERT {} {} {}",
                    rid.get_page_num(),
                    rid.get_slot_num(),
                    key
                )?;
                writeln!(self.out, "DO")?;
            }
            TraceEvent::Visit { page } => writeln!(self.out, "VISIT node {}", page)?,
            TraceEvent::IndexChildren {
                page,
                left_link,
                children,
            } => {
                writeln!(self.out, "INDEX CHILDREN {} nodes", page)?;
                write!(self.out, " {}", left_link)?;
                for child in children {
                    write!(self.out, "   {}", child)?;
                }
                writeln!(self.out)?;
            }
            TraceEvent::LeafChildren { page, entries } => {
                writeln!(self.out, "LEAF CHILDREN {} nodes", page)?;
                for (key, rid) in entries {
                    write!(self.out, "   {} {}", key, rid)?;
                }
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> TraceSink for WriterTrace<W> {
    fn event(&mut self, event: &TraceEvent) {
        if let Err(e) = self.render(event) {
            warn!("Writing trace event {:?} failed: {}", event, e);
        }
    }
}

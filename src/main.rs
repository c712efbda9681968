/**********************************************
  > File Name		: main.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Mon 01 Mar 2021 03:56:10 PM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Usage: arcturus-btree <dir> [page size] [key count]
 *
 * Builds an integer index in <dir>/demo.idx, tracing every insert to
 * stdout, then prints a full scan. Set RUST_LOG=debug to see splits.
 */

use std::env;
use std::io;
use std::process;

use log::{error, info};

use arcturus_btree::indexing::WriterTrace;
use arcturus_btree::{
    AttrType, DeletePolicy, IndexFileManager, IndexingError, Key, PageFileManager, PageFileOptions, RID,
};

fn run(dir: &str, page_size: usize, count: i32) -> Result<(), IndexingError> {
    let path = std::path::Path::new(dir).join("demo.idx");
    let pfm = PageFileManager::with_options(PageFileOptions::default().with_page_size(page_size));
    let pfh = pfm.open_or_create(&path)?;

    let mut index = IndexFileManager::create_file(&pfh, "demo", AttrType::INT, 4, DeletePolicy::Naive)?;
    index.attach_trace(Box::new(WriterTrace::new(io::stdout())));

    //a fixed stride walks every residue, keys arrive out of order.
    for i in 0..count {
        let key = (i * 7919) % count;
        index.insert_entry(&Key::Int(key), &RID::new(i as u32, 0))?;
    }
    index.detach_trace();
    info!("Index depth is {}", index.depth()?);
    index.dump_tree()?;

    let mut scan = index.scan(None, None)?;
    while let Some((key, rid)) = scan.get_next()? {
        println!("{} {}", key, rid);
    }
    scan.close()?;
    index.close()?;
    pfh.close()?;
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <dir> [page size] [key count]", args[0]);
        process::exit(2);
    }
    let page_size = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(256);
    let count = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);

    if let Err(e) = run(&args[1], page_size, count) {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

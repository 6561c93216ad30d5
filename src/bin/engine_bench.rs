//! Minimal load-and-measure harness for exercising the three engines
//! by hand (spec §1: CLI and benchmark harness are out of scope for the
//! core; this is the thin driver that remains). Grounded on
//! `rdms-perf`'s `Opt`/`StructOpt` shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use structopt::StructOpt;

use tkv_core::catalog::{Catalog, ColumnDef, ColumnType, Schema, TableSpec};
use tkv_core::config::Config;
use tkv_core::engine::lsm::LsmEngine;
use tkv_core::engine::opt_sp::OptSpEngine;
use tkv_core::engine::wal::WalEngine;
use tkv_core::engine::Engine;
use tkv_core::record::{Record, Value};
use tkv_core::statement::Statement;

#[derive(Clone, StructOpt)]
pub struct Opt {
    #[structopt(long = "engine", default_value = "wal")]
    engine: String,

    #[structopt(long = "fs-path", default_value = "./engine_bench.data")]
    fs_path: PathBuf,

    #[structopt(long = "inserts", default_value = "100000")]
    inserts: u64,

    #[structopt(long = "selects", default_value = "100000")]
    selects: u64,
}

fn bench_schema() -> Schema {
    Schema::new(vec![
        ColumnDef::new("id", ColumnType::I64, true, true),
        ColumnDef::new("value", ColumnType::I64, true, true),
    ])
}

fn open_catalog(opt: &Opt) -> Catalog {
    let spec = TableSpec {
        name: "bench".to_string(),
        schema: bench_schema(),
        max_tuple_size: 64,
        indices: vec![vec!["id".to_string()]],
    };
    Catalog::open(&opt.fs_path, vec![spec]).expect("open catalog")
}

fn run_engine(opt: &Opt, engine: &dyn Engine, catalog: &Arc<Catalog>) {
    let schema = Arc::clone(&catalog.table(0).schema);

    let start = Instant::now();
    for i in 0..opt.inserts {
        let record = Record::new(schema.clone(), vec![Value::I64(i as i64), Value::I64(i as i64)]);
        let statement = Statement::new(i, tkv_core::OpType::Insert, 0, record, schema.clone());
        engine.insert(statement).expect("insert");
    }
    let insert_elapsed = start.elapsed();

    let start = Instant::now();
    for i in 0..opt.selects {
        let key = i % opt.inserts.max(1);
        let record = Record::new(schema.clone(), vec![Value::I64(key as i64), Value::Null]);
        let statement = Statement::new(i, tkv_core::OpType::Select, 0, record, schema.clone());
        engine.select(&statement).expect("select");
    }
    let select_elapsed = start.elapsed();

    println!(
        "{}: {} inserts in {:?}, {} selects in {:?}",
        opt.engine, opt.inserts, insert_elapsed, opt.selects, select_elapsed
    );
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    let catalog = Arc::new(open_catalog(&opt));
    let mut config = Config::default();
    config.set_fs_path(opt.fs_path.clone());

    match opt.engine.as_str() {
        "wal" => {
            let engine = WalEngine::open(catalog.clone(), config).expect("open wal engine");
            run_engine(&opt, &engine, &catalog);
        }
        "lsm" => {
            let engine = LsmEngine::open(catalog.clone(), config).expect("open lsm engine");
            run_engine(&opt, &engine, &catalog);
        }
        "opt-sp" => {
            let engine = OptSpEngine::open(catalog.clone(), config).expect("open opt-sp engine");
            run_engine(&opt, &engine, &catalog);
        }
        other => println!("engine_bench: error invalid engine {}", other),
    }
}

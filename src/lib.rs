pub mod core;
pub mod compression;
pub mod codec;
pub mod analysis;
pub mod hashing;
pub mod mmap;
pub mod storage;
pub mod index;
pub mod writer;
pub mod oracle;
pub mod resolve;
pub mod enrich;

/*
┌────────────────────────────────────────────────────────────────────────────────────────────┐
│                               GLUTTON STRUCT ARCHITECTURE                                   │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────────────────────────────────────────────────────────────┐    │
│  │                               struct Database                                       │    │
│  │  ┌──────────────────────────────────────────────────────────────────────────────┐ │    │
│  │  │ config: Arc<Config>               // Immutable after open                    │ │    │
│  │  │ engine: ResolutionEngine          // Indices + oracle + gate                 │ │    │
│  │  │ start_time: Instant               // Uptime for diagnostics                  │ │    │
│  │  └──────────────────────────────────────────────────────────────────────────────┘ │    │
│  └────────────────────────────────────────────────────────────────────────────────────┘    │
│                                                                                              │
│  ┌──────────────────┐  ┌──────────────────┐  ┌───────────────────────────────────────┐    │
│  │ struct Config    │  │ struct IstexRec  │  │ struct Diagnostics                    │    │
│  │ • storage_path   │  │ • istex_id       │  │ • indices: {map name → count}         │    │
│  │ • env_paths      │  │ • doi/ark/pmid/  │  │ • gate: GateStats                     │    │
│  │ • codec          │  │   pmc/pii: Vec   │  │ • oracle_configured                   │    │
│  │ • batch_size     │  └──────────────────┘  └───────────────────────────────────────┘    │
│  │ • max_accepted_  │  ┌──────────────────┐  ┌──────────────────┐                          │
│  │   requests       │  │ struct PmidRec   │  │ struct BiblioRec │                          │
│  │ • validation_    │  │ • pmid/pmcid/doi │  │ • doi/title/     │                          │
│  │   policy         │  └──────────────────┘  │   first_author.. │                          │
│  └──────────────────┘                        └──────────────────┘                          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── RESOLUTION LAYER ───────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────────┐  ┌─────────────────────────┐  ┌──────────────────────────┐ │
│  │ struct ResolutionEngine    │  │ enum Outcome            │  │ struct ConcurrencyGate   │ │
│  │ • indices: CrossRefIndices │  │ • Found(ResolvedRecord) │  │ • permits: Arc<Semaphore>│ │
│  │ • oracle: Option<Arc<dyn>> │  │ • NotFound              │  │ • capacity: usize        │ │
│  │ • gate: Arc<Gate>          │  │ • Ambiguous             │  │ try_admit() → permit or  │ │
│  │ • cache: ExtractionCache   │  │ • UpstreamUnavailable   │  │   ServiceOverloaded      │ │
│  │ • policy                   │  │ • ServiceOverloaded     │  └──────────────────────────┘ │
│  └────────────────────────────┘  └─────────────────────────┘                               │
│   exact DOI → PMID → PMCID → ISTEX id → PII → metadata hash → citation (DOI, then hash)    │
│   hashed hits ──▶ oracle (cache → gate → timeout, 1 retry) ──▶ title + author match        │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── INDEX LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐ ┌──────────────────────────┐  │
│  │ PubMedIndex     │ │ IstexIndex      │ │ OpenAccessIndex │ │ BiblioIndex              │  │
│  │ env "pmid"      │ │ env "istex"     │ │ env "unpaywall" │ │ env "crossref"           │  │
│  │ doi→pmid/pmcid  │ │ id/doi/pii→rec  │ │ doi→oa url      │ │ doi→biblio (compressed)  │  │
│  │ pmid/pmcid→doi  │ │                 │ │                 │ │ metahash/citehash→doi    │  │
│  └─────────────────┘ └─────────────────┘ └─────────────────┘ └──────────────────────────┘  │
│            EnrichmentPass: istex records ─▶ fill pmid/pmc from PubMedIndex ─▶ sink          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE LAYER ──────────────────────────────────────────┐
│                                                                                              │
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌───────────────────────┐          │
│  │ struct IndexStore      │  │ struct Index<K, V>   │  │ struct WAL            │          │
│  │ • layout               │  │ • store: IndexStore  │  │ • file: File          │          │
│  │ • codec: Arc<Codec>    │  │ • core: Arc<MapCore> │  │ • position: u64       │          │
│  │ • maps: name → MapCore │  │ get/put/delete/iter/ │  │ • sync_mode: SyncMode │          │
│  │ • writer: WAL + ckpt   │  │ count                │  │ • generation: u64     │          │
│  │ • lock: FileLock       │  └──────────────────────┘  └───────────────────────┘          │
│  └────────────────────────┘                                                                 │
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌───────────────────────┐          │
│  │ struct MapCore         │  │ struct SegmentWriter │  │ struct SegmentReader  │          │
│  │ • state: RwLock<Arc<   │  │ • tempfile + crc32   │  │ • mmap: MmapFile      │          │
│  │   MapState>> (CoW)     │  │ • sampled offsets    │  │ • sparse index search │          │
│  │ • memtable over        │  │ • persist on finish  │  └───────────────────────┘          │
│  │   segments, newest 1st │  └──────────────────────┘  ┌───────────────────────┐          │
│  └────────────────────────┘                            │ TieredMergePolicy     │          │
│                                                         │ newest run of similar │          │
│                                                         │ sized segments merges │          │
│                                                         └───────────────────────┘          │
│  ┌────────────────────────┐  ┌──────────────────────┐  ┌───────────────────────┐          │
│  │ struct Manifest        │  │ struct Checkpoint    │  │ struct Codec          │          │
│  │ • maps: name → form    │  │ • wal_generation     │  │ [ver][bincode]        │          │
│  │ • format_version       │  │ • maps: name → seg   │  │ + Snappy/LZ4/Zstd for │          │
│  └────────────────────────┘  │   list + live count  │  │ compressed maps       │          │
│                               └──────────────────────┘  └───────────────────────┘          │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/

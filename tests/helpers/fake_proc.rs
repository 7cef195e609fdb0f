#![allow(dead_code)]
//! A synthetic `/proc` tree on disk, for driving the real counter reader.

use procload::core::Pid;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
struct FakeProcess {
    utime: u64,
    stime: u64,
    start_time: u64,
    rss_pages: u64,
}

/// Writes `stat`, `uptime`, `meminfo` and per-process directories into a
/// temporary directory that `ProcFs` can be pointed at.
pub struct FakeProc {
    dir: TempDir,
    processes: BTreeMap<Pid, FakeProcess>,
}

impl FakeProc {
    /// A tree with an idle system, one second of uptime and 2 GB available.
    pub fn new() -> Self {
        let fake = Self {
            dir: TempDir::new().unwrap(),
            processes: BTreeMap::new(),
        };
        fake.set_system(0, 0, 0, 1.0);
        fake.set_available_kb(2_048_000);
        fake
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Rewrites the aggregate cpu line and the uptime.
    pub fn set_system(&self, user: u64, system: u64, idle: u64, uptime_seconds: f64) {
        let stat = format!(
            "cpu  {user} 0 {system} {idle} 0 0 0 0 0 0\n\
             cpu0 {user} 0 {system} {idle} 0 0 0 0 0 0\n\
             intr 0\n\
             ctxt 0\n\
             btime 1700000000\n\
             processes 1\n\
             procs_running 1\n\
             procs_blocked 0\n\
             softirq 0 0 0 0 0 0 0 0 0 0 0\n"
        );
        fs::write(self.path().join("stat"), stat).unwrap();
        fs::write(
            self.path().join("uptime"),
            format!("{:.2} 0.00\n", uptime_seconds),
        )
        .unwrap();
    }

    pub fn set_available_kb(&self, kb: u64) {
        let meminfo = format!(
            "MemTotal:        8000000 kB\n\
             MemFree:         1000000 kB\n\
             MemAvailable:    {kb} kB\n\
             Buffers:          100000 kB\n\
             Cached:          2000000 kB\n\
             SwapCached:            0 kB\n\
             Active:          3000000 kB\n\
             Inactive:        1500000 kB\n\
             Active(anon):    1000000 kB\n\
             Inactive(anon):   100000 kB\n\
             Active(file):    2000000 kB\n\
             Inactive(file):  1400000 kB\n\
             Unevictable:           0 kB\n\
             Mlocked:               0 kB\n\
             SwapTotal:       1000000 kB\n\
             SwapFree:        1000000 kB\n\
             Dirty:               100 kB\n\
             Writeback:             0 kB\n\
             AnonPages:       1100000 kB\n\
             Mapped:           400000 kB\n\
             Shmem:            100000 kB\n\
             KReclaimable:     200000 kB\n\
             Slab:             300000 kB\n\
             SReclaimable:     200000 kB\n\
             SUnreclaim:       100000 kB\n\
             KernelStack:       10000 kB\n\
             PageTables:        20000 kB\n\
             NFS_Unstable:          0 kB\n\
             Bounce:                0 kB\n\
             WritebackTmp:          0 kB\n\
             CommitLimit:     5000000 kB\n\
             Committed_AS:    4000000 kB\n\
             VmallocTotal:   34359738367 kB\n\
             VmallocUsed:       50000 kB\n\
             VmallocChunk:          0 kB\n\
             Percpu:             4000 kB\n\
             HardwareCorrupted:     0 kB\n\
             AnonHugePages:         0 kB\n\
             ShmemHugePages:        0 kB\n\
             ShmemPmdMapped:        0 kB\n\
             CmaTotal:              0 kB\n\
             CmaFree:               0 kB\n\
             HugePages_Total:       0\n\
             HugePages_Free:        0\n\
             HugePages_Rsvd:        0\n\
             HugePages_Surp:        0\n\
             Hugepagesize:       2048 kB\n\
             Hugetlb:               0 kB\n\
             DirectMap4k:      200000 kB\n\
             DirectMap2M:     8000000 kB\n"
        );
        fs::write(self.path().join("meminfo"), meminfo).unwrap();
    }

    /// Deletes a system-wide counter file, e.g. `"meminfo"`.
    pub fn remove(&self, name: &str) {
        fs::remove_file(self.path().join(name)).unwrap();
    }

    /// Adds a process with the given argv and accumulated ticks.
    pub fn spawn(
        &mut self,
        pid: Pid,
        argv: &[&str],
        utime: u64,
        stime: u64,
        start_time: u64,
        rss_pages: u64,
    ) {
        let pid_dir = self.path().join(pid.to_string());
        fs::create_dir_all(&pid_dir).unwrap();
        let mut raw = Vec::new();
        for arg in argv {
            raw.extend_from_slice(arg.as_bytes());
            raw.push(0);
        }
        fs::write(pid_dir.join("cmdline"), raw).unwrap();

        let process = FakeProcess {
            utime,
            stime,
            start_time,
            rss_pages,
        };
        self.processes.insert(pid, process);
        self.write_process_stat(pid, &process);
    }

    /// Updates the accumulated ticks of a running process.
    pub fn set_ticks(&mut self, pid: Pid, utime: u64, stime: u64) {
        let process = self.processes.get_mut(&pid).expect("unknown fake pid");
        process.utime = utime;
        process.stime = stime;
        let process = *process;
        self.write_process_stat(pid, &process);
    }

    /// Removes the process directory, as when the process exits.
    pub fn kill(&mut self, pid: Pid) {
        self.processes.remove(&pid);
        fs::remove_dir_all(self.path().join(pid.to_string())).unwrap();
    }

    fn write_process_stat(&self, pid: Pid, process: &FakeProcess) {
        let stat = format!(
            "{pid} (fake) S 1 {pid} {pid} 0 -1 4194560 100 0 0 0 {} {} 0 0 20 0 1 0 {} 1000000 {} \
             18446744073709551615 1 1 0 0 0 0 0 4096 1260 0 0 0 17 3 0 0 0 0 0 0 0 0 0 0 0 0 0\n",
            process.utime, process.stime, process.start_time, process.rss_pages
        );
        fs::write(self.path().join(pid.to_string()).join("stat"), stat).unwrap();
    }
}

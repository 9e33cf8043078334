use bindgen::Formatter;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use version_compare::Version;

const DPDK_PREFERRED_VERSION: &str = "23.11";
const DPDK_GIT_REPO: &str = "https://dpdk.org/git/dpdk";

// On Ubuntu server, we need the following packages:
// 1. meson (apt install meson) for meson build
// 2. pyelf-tool (apt install python3-pyelftools) for meson configuration
// 3. clang (apt install clang) for bindgen
// 4. libnuma-dev (apt install libnuma-dev) for NUMA support

// To rebuild everything, remove dpdk-sys/deps/configure-finish file.

fn build_dpdk_ffi() {
    let output = Command::new("pkg-config")
        .args(["--cflags", "libdpdk"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let cflags = String::from_utf8(output.stdout).unwrap();

    let cflags_iter = cflags.trim().split(' ');
    let mut cbuild = cc::Build::new();
    cbuild.opt_level(3);
    for cflag in cflags_iter.clone() {
        cbuild.flag(cflag);
    }
    cbuild.file("csrc/impl.c").compile("impl");
    println!("cargo:rerun-if-changed=csrc/impl.c");

    let outdir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut bgbuilder = bindgen::builder()
        .allowlist_function("rte_.*_")
        .allowlist_function("rte_thread_set_affinity")
        .allowlist_function("rte_thread_register")
        .allowlist_function("rte_pktmbuf_pool_create")
        .allowlist_function("rte_mempool_free")
        .allowlist_function("rte_mempool_avail_count")
        .allowlist_function("rte_pktmbuf_free_bulk")
        .allowlist_function("rte_eth_dev_info_get")
        .allowlist_function("rte_eth_dev_count_avail")
        .allowlist_function("rte_eth_macaddr_get")
        .allowlist_function("rte_eth_stats_get")
        .allowlist_function("rte_eth_dev_socket_id")
        .allowlist_function("rte_eth_dev_configure")
        .allowlist_function("rte_eth_dev_start")
        .allowlist_function("rte_eth_dev_stop")
        .allowlist_function("rte_eth_dev_close")
        .allowlist_function("rte_eth_rx_queue_setup")
        .allowlist_function("rte_eth_tx_queue_setup")
        .allowlist_function("rte_eth_promiscuous_enable")
        .allowlist_function("rte_eth_promiscuous_disable")
        .allowlist_function("rte_eal_init")
        .allowlist_function("rte_eal_cleanup")
        .allowlist_type("rte_eth_conf")
        .allowlist_type("rte_eth_dev_info")
        .allowlist_type("rte_ether_addr")
        .allowlist_type("rte_mempool")
        .allowlist_type("rte_mbuf")
        .allowlist_type("rte_eth_stats")
        .allowlist_var("RTE_MAX_LCORE")
        .allowlist_var("RTE_MAX_NUMA_NODES")
        .allowlist_var("RTE_MBUF_MAX_NB_SEGS")
        .allowlist_var("RTE_MBUF_DEFAULT_DATAROOM")
        .allowlist_var("RTE_PKTMBUF_HEADROOM")
        .allowlist_var("RTE_ETHDEV_QUEUE_STAT_CNTRS")
        .header("csrc/header.h");
    for cflag in cflags_iter {
        bgbuilder = bgbuilder.clang_arg(cflag);
    }
    bgbuilder
        .formatter(Formatter::Rustfmt)
        .generate()
        .expect("unable to generate rust bindings from csrc/header.h")
        .write_to_file(outdir.join("dpdk.rs"))
        .unwrap();
    println!("cargo:rerun-if-changed=csrc/header.h");

    let output = Command::new("pkg-config")
        .args(["--libs", "--static", "libdpdk"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let ldflags = String::from_utf8(output.stdout).unwrap();
    for ldflag in ldflags.trim().split(' ') {
        if let Some(path) = ldflag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={path}");
        } else if let Some(lib) = ldflag.strip_prefix("-l") {
            if ldflag.ends_with(".a") {
                if !ldflag.starts_with("-l:lib") {
                    panic!("invalid linker option: {ldflag}");
                }
                let end_range = ldflag.len() - 2;
                println!(
                    "cargo:rustc-link-lib=static:+whole-archive,-bundle={}",
                    &ldflag[6..end_range]
                );
            } else if !ldflag.starts_with("-lrte") {
                println!("cargo:rustc-link-lib={lib}");
            }
        } else if ldflag == "-pthread" {
            println!("cargo:rustc-link-lib=pthread");
        } else if ldflag.starts_with("-Wl") {
            // ignored
        } else if !ldflag.is_empty() {
            panic!("invalid linker option: {ldflag}");
        }
    }
}

fn main() {
    let dpdk_min_version: Version = Version::from("21.11").unwrap();
    let dpdk_max_version: Version = Version::from("24.03.9999").unwrap();

    let output = Command::new("pkg-config")
        .args(["--modversion", "libdpdk"])
        .output()
        .expect("cannot find pkg-config, please install pkg-config");
    if output.status.success() {
        let s = String::from_utf8(output.stdout).unwrap();
        let version_str = s.trim();
        let version = Version::from(version_str).unwrap();
        if version < dpdk_min_version || version > dpdk_max_version {
            panic!(
                "pkg-config found DPDK {version_str}, want a version between {dpdk_min_version} and {dpdk_max_version}"
            );
        }

        build_dpdk_ffi();
        return;
    }

    let pwd = fs::canonicalize(PathBuf::from("./")).unwrap();

    if !Path::new("deps/dpdk").is_dir() {
        let tag = format!("v{DPDK_PREFERRED_VERSION}");
        let res = Command::new("git")
            .args(["clone", "-b", &tag, DPDK_GIT_REPO, "deps/dpdk"])
            .status()
            .expect("cannot find git, please install git");
        if !res.success() {
            panic!("failed to clone DPDK repo {DPDK_GIT_REPO} at tag {tag}");
        }
    }

    if !Path::new("deps/configure-finish").is_file() {
        let build_dir = Path::new("deps/dpdk/build");
        if build_dir.is_dir() {
            fs::remove_dir_all(build_dir).expect("failed to remove existing deps/dpdk/build");
        }

        let mut meson_dprefix = String::from("-Dprefix=");
        meson_dprefix.push_str(pwd.join("deps/dpdk-install").to_str().unwrap());
        let res = Command::new("meson")
            .current_dir("deps/dpdk")
            .args([&meson_dprefix[..], "build"])
            .status()
            .expect("cannot find meson, please install meson");
        if !res.success() {
            panic!("failed to configure DPDK source with meson");
        }

        fs::File::create(Path::new("deps/configure-finish")).expect("failed to create deps/configure-finish");
        println!("cargo:rerun-if-changed=deps/configure-finish");
    }

    let res = Command::new("ninja")
        .current_dir("deps/dpdk/build")
        .status()
        .expect("cannot find ninja, please install ninja");
    if !res.success() {
        panic!("failed to build DPDK with ninja");
    }
    let res = Command::new("ninja")
        .current_dir("deps/dpdk/build")
        .args(["install"])
        .status()
        .unwrap();
    assert!(res.success());

    env::set_var(
        "PKG_CONFIG_PATH",
        pwd.join("deps/dpdk-install/lib/x86_64-linux-gnu/pkgconfig").to_str().unwrap(),
    );

    build_dpdk_ffi();
}

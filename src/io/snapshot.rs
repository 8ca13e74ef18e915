//! JSON snapshot emission.
//!
//! The schema is stable and floats are fixed to four decimals, so the
//! writer formats by hand rather than going through a serializer that
//! would drop trailing zeros. Tests parse the output with `serde_json`
//! to keep it honest JSON.

use std::fmt::Write as _;

use crate::kernel::Kernel;

/// Serialize the kernel to the driver snapshot schema:
/// `{"generation": …, "metrics": {…}, "agents": [{…}, …]}`.
pub fn kernel_to_json(kernel: &Kernel, include_traits: bool) -> String {
    let metrics = kernel.compute_metrics();
    let agents = kernel.agents();

    // ~90 bytes per agent plus headroom.
    let mut out = String::with_capacity(agents.len() * 96 + 256);

    out.push('{');
    let _ = write!(out, "\"generation\":{},", kernel.generation());
    let _ = write!(
        out,
        "\"metrics\":{{\"polarizationMean\":{:.4},\"polarizationStd\":{:.4},\"avgOpenness\":{:.4},\"avgConformity\":{:.4}}},",
        metrics.polarization_mean,
        metrics.polarization_std,
        metrics.avg_openness,
        metrics.avg_conformity
    );

    out.push_str("\"agents\":[");
    for (i, agent) in agents.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(
            out,
            "{{\"id\":{},\"region\":{},\"lang\":{},\"beliefs\":[{:.4},{:.4},{:.4},{:.4}]",
            agent.id, agent.region, agent.primary_lang, agent.b[0], agent.b[1], agent.b[2], agent.b[3]
        );
        if include_traits {
            let _ = write!(
                out,
                ",\"traits\":{{\"openness\":{:.4},\"conformity\":{:.4},\"assertiveness\":{:.4},\"sociality\":{:.4}}}",
                agent.openness, agent.conformity, agent.assertiveness, agent.sociality
            );
        }
        out.push('}');
    }
    out.push_str("]}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimConfig;

    fn tiny_kernel() -> Kernel {
        // Demography off: the agent count must stay fixed for the
        // shape assertions.
        Kernel::new(SimConfig {
            population: 20,
            regions: 3,
            avg_connections: 4,
            demography_enabled: false,
            ..SimConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn snapshot_is_valid_json_with_expected_shape() {
        let mut kernel = tiny_kernel();
        kernel.step_n(3);
        let json = kernel_to_json(&kernel, false);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(value["generation"], 3);
        assert!(value["metrics"]["polarizationMean"].is_number());
        assert!(value["metrics"]["avgConformity"].is_number());
        let agents = value["agents"].as_array().unwrap();
        assert_eq!(agents.len(), 20);
        assert_eq!(agents[0]["beliefs"].as_array().unwrap().len(), 4);
        assert!(agents[0].get("traits").is_none());
    }

    #[test]
    fn traits_appear_only_on_request() {
        let kernel = tiny_kernel();
        let json = kernel_to_json(&kernel, true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let traits = &value["agents"][0]["traits"];
        assert!(traits["openness"].is_number());
        assert!(traits["sociality"].is_number());
    }

    #[test]
    fn floats_carry_fixed_precision() {
        let kernel = tiny_kernel();
        let json = kernel_to_json(&kernel, false);
        // Every belief is rendered with exactly four decimals.
        let beliefs_section = json.split("\"beliefs\":[").nth(1).unwrap();
        let first = beliefs_section.split(&[',', ']'][..]).next().unwrap();
        let decimals = first.split('.').nth(1).unwrap_or("");
        assert_eq!(decimals.len(), 4, "got {:?}", first);
    }
}

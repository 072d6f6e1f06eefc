//! FEA Core Example - Tied node on a quad face and a plastic loading cycle

use anyhow::Result;
use fea_core::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== FEA Core Example: Tied Node ===\n");

    // Square face with a node tied to it
    //
    //     N4 -------- N3
    //     |           |
    //     |    N5     |
    //     |           |
    //     N1 -------- N2
    //
    let mut domain = Domain::new();
    domain.add_node(Node::new(1, 0.0, 0.0, 0.0))?;
    domain.add_node(Node::new(2, 2.0, 0.0, 0.0))?;
    domain.add_node(Node::new(3, 2.0, 2.0, 0.0))?;
    domain.add_node(Node::new(4, 0.0, 2.0, 0.0))?;
    domain.add_node(Node::new(5, 0.5, 1.5, 0.0))?;
    domain.add_element(Element::quad4(1, [1, 2, 3, 4]))?;

    domain.add_constraint(MultiRetainedConstraint::interpolated(1, 1, 5, &[0, 1, 2]))?;
    // References an element that does not exist
    domain.add_constraint(MultiRetainedConstraint::interpolated(2, 99, 5, &[2]))?;

    for diag in domain.diagnostics() {
        println!("Diagnostic: {}", diag);
    }

    let tied = domain.constraint(1)?;
    println!("{}", tied);

    // Pretend the global solve left a vertical reaction at the tied node
    domain.node_mut(5)?.set_reaction(&[0.0, 0.0, -100.0])?;
    domain.distribute_reactions(&AnalysisOptions::default())?;

    let mut total = 0.0;
    for tag in 1..=5 {
        let r = domain.node_reactions(tag)?;
        total += r.fz;
        println!("  Node {}: FZ = {:10.4}", tag, r.fz);
    }
    println!("  Sum:    FZ = {:10.4}\n", total);

    println!("=== FEA Core Example: J2 Loading Cycle ===\n");

    let mut point = J2Material::new(1, MaterialKind::PlaneStress, J2Parameters::steel())?;
    let strains = [0.0005, 0.001, 0.002, 0.004, 0.002, 0.0, -0.002];

    println!("{:>10} {:>12} {:>12} {:>8}", "eps_11", "sig_11", "xi", "plastic");
    for eps in strains {
        let update = point.set_trial_strain(&[eps, 0.0, 0.0], 0.0)?;
        if let Some(diag) = &update.diagnostic {
            println!("  {}", diag);
        }
        point.commit_state()?;
        println!(
            "{:>10.5} {:>12.4} {:>12.6} {:>8}",
            eps,
            point.stress()[0],
            point.core().hardening_variable(),
            update.yielded
        );
    }

    println!("\n{}", point);

    let mut channel = MemoryChannel::new();
    point.send_self(1, &mut channel)?;
    let restored = J2Material::recv_self(1, &channel)?;
    println!(
        "Restored point: sig_11 = {:.4}, xi = {:.6}",
        restored.stress()[0],
        restored.core().committed_hardening_variable()
    );

    Ok(())
}

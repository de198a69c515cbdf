use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let resources = [
        confluent_operator::resources::ProviderConfig::crd(),
        confluent_operator::resources::ServiceAccount::crd(),
        confluent_operator::resources::Acl::crd(),
    ];

    for resource in resources {
        println!("---");
        print!("{}", serde_yaml::to_string(&resource)?);
    }

    Ok(())
}

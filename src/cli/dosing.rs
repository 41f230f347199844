use clap::Args;

use crate::cli::OutputFormat;
use crate::dosing::calculator::{
    convert_weight, drip_rate, weight_based_dose, DoseRequest, DripRequest, Quantity, WeightUnit,
};

#[derive(Args)]
pub struct DoseArgs {
    /// Patient weight
    #[arg(long)]
    pub weight: f64,

    /// Unit of --weight
    #[arg(long, value_enum, default_value = "kg")]
    pub weight_unit: WeightUnit,

    /// Ordered dose in mg/kg
    #[arg(long)]
    pub dose: f64,

    /// Drug amount in the stock solution, in mg
    #[arg(long)]
    pub concentration_mg: f64,

    /// Stock solution volume holding --concentration-mg, in mL
    #[arg(long, default_value = "1")]
    pub concentration_ml: f64,
}

#[derive(Args)]
pub struct DripArgs {
    /// Volume to infuse, in mL
    #[arg(long)]
    pub volume: f64,

    /// Infusion time, in minutes
    #[arg(long)]
    pub time: f64,

    /// Administration set drop factor, in gtts/mL
    #[arg(long)]
    pub drop_factor: f64,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Weight to convert
    #[arg(required = true, allow_negative_numbers = true)]
    pub value: f64,

    /// Target unit (the value is read in the other unit)
    #[arg(long, value_enum)]
    pub to: WeightUnit,
}

fn print_quantity(label: &str, quantity: &Quantity, format: OutputFormat) {
    match format {
        OutputFormat::Tsv => match quantity.as_f64() {
            Some(value) => println!("{label}\t{value:.2}"),
            None => println!("{label}\t"),
        },
        _ => println!("{label}: {quantity}"),
    }
}

pub fn run_dose(args: DoseArgs, format: OutputFormat) -> anyhow::Result<()> {
    let weight_kg = convert_weight(args.weight, args.weight_unit, WeightUnit::Kg)?;
    let result = weight_based_dose(&DoseRequest {
        weight_kg,
        dose_mg_per_kg: args.dose,
        concentration_mg: args.concentration_mg,
        concentration_ml: args.concentration_ml,
    })?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "weight_kg": weight_kg,
                "total_dose": result.total_dose,
                "volume": result.volume,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text | OutputFormat::Tsv => {
            if matches!(format, OutputFormat::Tsv) {
                println!("field\tvalue");
            } else if args.weight_unit == WeightUnit::Lbs {
                println!("Weight: {weight_kg:.2} kg");
            }
            print_quantity("Total dose", &result.total_dose, format);
            print_quantity("Volume", &result.volume, format);
        }
    }

    Ok(())
}

pub fn run_drip(args: DripArgs, format: OutputFormat) -> anyhow::Result<()> {
    let rate = drip_rate(&DripRequest {
        volume_ml: args.volume,
        time_min: args.time,
        drop_factor: args.drop_factor,
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rate)?),
        OutputFormat::Tsv => {
            println!("field\tvalue");
            print_quantity("Drip rate", &rate, format);
        }
        OutputFormat::Text => print_quantity("Drip rate", &rate, format),
    }

    Ok(())
}

pub fn run_convert(args: ConvertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let from = match args.to {
        WeightUnit::Kg => WeightUnit::Lbs,
        WeightUnit::Lbs => WeightUnit::Kg,
    };
    let converted = convert_weight(args.value, from, args.to)?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "value": args.value,
                "from": from,
                "result": converted,
                "to": args.to,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("value\tfrom\tresult\tto");
            println!("{}\t{from}\t{converted:.2}\t{}", args.value, args.to);
        }
        OutputFormat::Text => println!("{} {from} = {converted:.2} {}", args.value, args.to),
    }

    Ok(())
}

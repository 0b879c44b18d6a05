//! Poise recovery and parry window decay.

use hecs::World;

use clash_core::components::DamageReceiver;

pub fn run(world: &mut World, dt: f32) {
    for (_entity, receiver) in world.query_mut::<&mut DamageReceiver>() {
        receiver.recover_poise(dt);
        if receiver.parry_window > 0.0 {
            receiver.parry_window = (receiver.parry_window - dt).max(0.0);
        }
    }
}
